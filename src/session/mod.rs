//! Collaboration sessions, their lifecycle and the process-wide registry.
mod registry;
mod session;
mod state;

pub use registry::Registry;
pub use session::{Reaction, Session};
pub use state::SessionState;
