//! The wire protocol exchanged between collaborating peers.
//!
//! Every message is a flat JSON object carrying a `type` discriminant plus the
//! routing fields of the sender. One message is written per line.
mod codec;

pub use codec::{decode, encode};

use std::fmt;

/// The identifier of a document view, supplied by the host editor.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub u64);

impl ViewId {
    /// Sender id used for replies which belong to no local view.
    pub const UNASSIGNED: ViewId = ViewId(0);
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A selection range in a document, `a` being the anchor and `b` the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub a: usize,
    pub b: usize,
}

impl Region {
    pub fn new(a: usize, b: usize) -> Self {
        Region { a, b }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Body {
    /// Handshake request, carrying the full contents of the source document.
    Start { fromname: String, contents: String },
    /// Handshake reply.
    StartResponse {
        #[serde(with = "flag")]
        accept: bool,
    },
    /// An edit command applied on the sending side.
    Cmd {
        cmd: String,
        #[serde(default)]
        args: serde_json::Value,
        #[serde(default)]
        sel: Vec<Region>,
    },
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Start { .. } => "start",
            Body::StartResponse { .. } => "startresponse",
            Body::Cmd { .. } => "cmd",
        }
    }
}

/// Routing fields stamped on every outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub fromhost: String,
    pub fromport: u16,
    pub fromid: ViewId,
    /// The session id on the receiving side, once negotiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toid: Option<ViewId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(flatten)]
    pub body: Body,
    #[serde(flatten)]
    pub route: Route,
}

impl WireMessage {
    pub fn new(body: Body, route: Route) -> Self {
        WireMessage { body, route }
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let toid = match self.route.toid {
            Some(id) => id.to_string(),
            None => "?".to_string(),
        };
        write!(
            f,
            "{} {}:{}-{} -> {}",
            self.body.kind(),
            self.route.fromhost,
            self.route.fromport,
            self.route.fromid,
            toid
        )
    }
}

// `accept` travels as `0|1`.
mod flag {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(accept: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(if *accept { 1 } else { 0 })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(D::Error::invalid_value(Unexpected::Unsigned(n as u64), &"0 or 1")),
        }
    }
}
