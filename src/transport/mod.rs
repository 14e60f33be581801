//! Transport workers: single blocking socket operations run off the scheduling thread.
mod receive;
mod send;
mod worker;

pub use receive::{Inbound, ReceiveOutcome, Received};
pub use send::{connect, SendJob, SendOutcome};
pub use worker::{drain_finished, Worker};
