use std::fmt;

/// The lifecycle of a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Handshake sent or awaiting acceptance.
    Pending,
    /// Handshake accepted by both sides.
    Active,
    /// Refused, timed out, closed by the peer or killed. Terminal.
    Dead,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed. Staying put is always allowed
    /// except for leaving `Dead`, which is impossible.
    pub fn can_become(self, next: SessionState) -> bool {
        match (self, next) {
            (SessionState::Dead, SessionState::Dead) => true,
            (SessionState::Dead, _) => false,
            (SessionState::Active, SessionState::Pending) => false,
            _ => true,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Active => write!(f, "active"),
            SessionState::Dead => write!(f, "dead"),
        }
    }
}
