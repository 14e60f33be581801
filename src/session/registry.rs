use super::session::Session;

use crate::host::{Host, START_STATUS};
use crate::protocol::ViewId;

use tracing::{debug, info};

use std::collections::HashMap;

/// All sessions of this process, keyed by local view id.
///
/// Dead sessions are tombstones: they stay in the map until the next lookup of their id
/// removes them, but no lookup ever returns one.
#[derive(Default)]
pub struct Registry {
    sessions: HashMap<ViewId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { sessions: HashMap::new() }
    }

    /// Inserts `session`, replacing any session registered for the same view. Returns
    /// `true` when the session is pending and a timeout has to be armed for it.
    pub fn register(&mut self, session: Session) -> bool {
        let pending = session.is_pending();
        info!("registered {}", session);
        if let Some(replaced) = self.sessions.insert(session.id(), session) {
            debug!("replaced {}", replaced);
        }
        pending
    }

    /// Returns the live session for `id`. Pending sessions are only returned when
    /// `include_pending` is set. Without a running listener every session is dead.
    pub fn lookup(&mut self, id: ViewId, include_pending: bool, listening: bool) -> Option<&mut Session> {
        if !listening {
            self.kill_all();
        }
        let dead = self.sessions.get(&id)?.is_dead();
        if dead {
            if let Some(session) = self.sessions.remove(&id) {
                debug!("removed {}", session);
            }
            return None;
        }
        let session = self.sessions.get_mut(&id)?;
        if session.is_pending() && !include_pending {
            return None;
        }
        Some(session)
    }

    /// Marks the pending or active session for `id` dead. Returns whether one was found.
    pub fn kill(&mut self, id: ViewId, listening: bool) -> bool {
        match self.lookup(id, true, listening) {
            Some(session) => {
                session.kill();
                true
            }
            None => false,
        }
    }

    pub fn kill_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.kill();
        }
    }

    /// Removes the session for `id` if it is still pending and tells the user it timed
    /// out. A no-op otherwise.
    pub fn evict_if_pending(&mut self, id: ViewId, host: &dyn Host) -> bool {
        let pending = match self.sessions.get(&id) {
            Some(session) => session.is_pending(),
            None => false,
        };
        if !pending {
            return false;
        }
        if let Some(session) = self.sessions.remove(&id) {
            info!("{} timed out", session);
            host.erase_status(id, START_STATUS);
            host.message_dialog(&format!("Collaboration with {} timed out", session.remote().name()));
        }
        true
    }

    /// The entry for `id` in whatever state, without sweeping.
    pub fn peek(&self, id: ViewId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn peek_mut(&mut self, id: ViewId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// The entry for `id` in whatever state, provided it is the session identified by
    /// `token`.
    pub fn find(&mut self, id: ViewId, token: u64) -> Option<&mut Session> {
        self.sessions.get_mut(&id).filter(|session| session.token() == token)
    }

    pub fn remove(&mut self, id: ViewId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Drops every session, closing their sockets.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::Collaborator;
    use crate::host::RecordingHost;
    use crate::protocol::{Body, Route, WireMessage};
    use crate::session::{Reaction, SessionState};

    fn collaborator(port: u16) -> Collaborator {
        Collaborator::new("127.0.0.1", Some(port), None)
    }

    fn pending(id: u64) -> Session {
        Session::new(ViewId(id), collaborator(22001), collaborator(22000))
    }

    fn active(id: u64) -> Session {
        Session::accepted(ViewId(id), ViewId(id + 100), collaborator(22001), collaborator(22000))
    }

    #[test]
    fn register_replaces_the_previous_session() {
        let mut registry = Registry::new();
        let first = active(1);
        let second = active(1);
        let token = second.token();
        assert!(!registry.register(first));
        assert!(!registry.register(second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(ViewId(1), false, true).unwrap().token(), token);
    }

    #[test]
    fn register_reports_pending_sessions() {
        let mut registry = Registry::new();
        assert!(registry.register(pending(1)));
        assert!(!registry.register(active(2)));
    }

    #[test]
    fn pending_sessions_need_opting_in() {
        let mut registry = Registry::new();
        let _ = registry.register(pending(1));
        assert!(registry.lookup(ViewId(1), false, true).is_none());
        assert!(registry.lookup(ViewId(1), true, true).is_some());
    }

    #[test]
    fn dead_sessions_are_invisible_and_swept() {
        let mut registry = Registry::new();
        let _ = registry.register(active(1));
        assert!(registry.kill(ViewId(1), true));
        // the tombstone stays until the next lookup
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(ViewId(1), true, true).is_none());
        assert_eq!(registry.len(), 0);
        assert!(!registry.kill(ViewId(1), true));
    }

    #[test]
    fn no_listener_means_no_sessions() {
        let mut registry = Registry::new();
        let _ = registry.register(active(1));
        let _ = registry.register(pending(2));
        assert!(registry.lookup(ViewId(1), true, false).is_none());
        assert_eq!(registry.peek(ViewId(2)).unwrap().state(), SessionState::Dead);
        assert!(registry.lookup(ViewId(2), true, true).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn eviction_happens_once() {
        let host = RecordingHost::new();
        let mut registry = Registry::new();
        let _ = registry.register(pending(1));
        assert!(registry.evict_if_pending(ViewId(1), &host));
        assert!(!registry.evict_if_pending(ViewId(1), &host));
        assert!(registry.lookup(ViewId(1), true, true).is_none());

        let record = host.record();
        assert_eq!(record.dialogs.len(), 1);
        assert!(record.dialogs[0].contains("timed out"));
    }

    #[test]
    fn eviction_skips_settled_sessions() {
        let host = RecordingHost::new();
        let mut registry = Registry::new();
        let _ = registry.register(pending(1));
        let response = WireMessage::new(
            Body::StartResponse { accept: true },
            Route { fromhost: "127.0.0.1".to_string(), fromport: 22001, fromid: ViewId(2), toid: Some(ViewId(1)) },
        );
        let reaction = registry.lookup(ViewId(1), true, true).unwrap().receive(response, &host);
        assert_eq!(reaction, Reaction::Established);

        assert!(!registry.evict_if_pending(ViewId(1), &host));
        assert!(host.record().dialogs.is_empty());
        assert!(registry.lookup(ViewId(1), false, true).is_some());
    }

    #[test]
    fn accepting_one_session_leaves_others_alone() {
        let host = RecordingHost::new();
        let mut registry = Registry::new();
        let _ = registry.register(pending(1));
        let _ = registry.register(pending(2));
        let response = WireMessage::new(
            Body::StartResponse { accept: true },
            Route { fromhost: "127.0.0.1".to_string(), fromport: 22001, fromid: ViewId(7), toid: Some(ViewId(2)) },
        );
        let _ = registry.lookup(ViewId(2), true, true).unwrap().receive(response, &host);
        assert_eq!(registry.peek(ViewId(2)).unwrap().state(), SessionState::Active);
        assert_eq!(registry.peek(ViewId(1)).unwrap().state(), SessionState::Pending);
    }

    #[test]
    fn late_refusal_leaves_active_session_alone() {
        let host = RecordingHost::new();
        let mut registry = Registry::new();
        let _ = registry.register(active(1));
        let refusal = WireMessage::new(
            Body::StartResponse { accept: false },
            Route { fromhost: "127.0.0.1".to_string(), fromport: 22001, fromid: ViewId(5), toid: Some(ViewId(1)) },
        );
        let reaction = registry.lookup(ViewId(1), true, true).unwrap().receive(refusal, &host);
        assert_eq!(reaction, Reaction::Ignored);
        assert_eq!(registry.peek(ViewId(1)).unwrap().state(), SessionState::Active);
        assert_eq!(registry.peek(ViewId(1)).unwrap().remote_id(), Some(ViewId(101)));
    }
}
