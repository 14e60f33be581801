//! The scheduling side of the protocol: the [Hub] actor, its listener and the inbound
//! message dispatcher.
mod dispatcher;
mod hub;
mod listener;
pub mod settings;

pub use dispatcher::Dispatch;
pub use hub::*;
pub use listener::Listener;
pub use settings::*;
