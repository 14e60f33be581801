#[macro_use]
extern crate serde_derive;
#[macro_use(Message, MessageResponse)]
extern crate actix_derive;
extern crate colored;

pub mod collaborator;
pub mod commands;
pub mod host;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Codec(serde_json::Error),
    Config(config::ConfigError),
    Actix(actix::MailboxError),

    // transport errors
    /// A received line exceeded the receive ceiling (in bytes).
    MessageTooLarge(usize),
    /// The host name did not resolve to any socket address.
    Unresolvable(String),
    JoinError,

    // command errors
    /// A `host[:port]` string could not be parsed.
    InvalidAddress(String),

    // session errors
    ListenerNotRunning,
    SessionDead,
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Codec(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(error: actix::MailboxError) -> Self {
        Error::Actix(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IO(err) => write!(f, "{}", err),
            Error::Codec(err) => write!(f, "bad data: {}", err),
            err => write!(f, "{:?}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
