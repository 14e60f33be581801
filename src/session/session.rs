use super::state::SessionState;

use crate::collaborator::Collaborator;
use crate::host::{Host, START_STATUS};
use crate::protocol::{encode, Body, Region, Route, ViewId, WireMessage};
use crate::transport::{SendJob, SendOutcome};
use crate::{Error, Result};

use tracing::{debug, error, info, warn};

use std::collections::VecDeque;
use std::fmt;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// What receiving a message did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// The handshake was accepted.
    Established,
    /// The handshake was refused; the session is dead.
    Refused,
    /// A remote command was applied to the view.
    Applied,
    Ignored,
}

/// One collaboration between a local view and a remote peer.
///
/// Outbound messages wait in an outbox and leave one at a time: the socket is lent to a
/// single send worker and handed back through [Session::on_sent].
pub struct Session {
    /// The local view id.
    id: ViewId,
    /// The peer's view id, known once negotiated.
    remote_id: Option<ViewId>,
    /// Distinguishes this session from any other that held the same `id`.
    token: u64,
    remote: Collaborator,
    local: Collaborator,
    state: SessionState,
    stream: Option<TcpStream>,
    outbox: VecDeque<WireMessage>,
    in_flight: bool,
}

impl Session {
    /// A session which still has to send its handshake request.
    pub fn new(id: ViewId, remote: Collaborator, local: Collaborator) -> Session {
        Session::with_state(id, None, remote, local, SessionState::Pending)
    }

    /// A session created by accepting a peer's request: the peer id is known and the
    /// handshake is already settled.
    pub fn accepted(id: ViewId, remote_id: ViewId, remote: Collaborator, local: Collaborator) -> Session {
        Session::with_state(id, Some(remote_id), remote, local, SessionState::Active)
    }

    fn with_state(
        id: ViewId,
        remote_id: Option<ViewId>,
        remote: Collaborator,
        local: Collaborator,
        state: SessionState,
    ) -> Session {
        let session = Session {
            id,
            remote_id,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            remote,
            local,
            state,
            stream: None,
            outbox: VecDeque::new(),
            in_flight: false,
        };
        debug!("created collaboration: {}", session);
        session
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn remote_id(&self) -> Option<ViewId> {
        self.remote_id
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn remote(&self) -> &Collaborator {
        &self.remote
    }

    pub fn local(&self) -> &Collaborator {
        &self.local
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == SessionState::Pending
    }

    pub fn is_dead(&self) -> bool {
        self.state == SessionState::Dead
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Messages not yet handed to a worker.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    /// Starts the collaboration. Without a known peer id this queues the handshake
    /// request, capturing the view contents now; otherwise there is nothing to ask for.
    /// The connection itself is opened by the first send worker.
    pub fn start(&mut self, host: &dyn Host) -> Result<()> {
        if self.remote_id.is_some() {
            debug!("{} starts without a request", self);
            return Ok(());
        }
        let contents = host.view_contents(self.id);
        host.set_status(
            self.id,
            START_STATUS,
            &format!("waiting for {} to start collaboration", self.remote.name()),
        );
        let file_name = host.file_name(self.id).unwrap_or_else(|| "new file".to_string());
        host.status_message(&format!(
            "Starting collaboration on {} with {}",
            file_name,
            self.remote.name()
        ));
        let fromname = self.local.name().to_string();
        self.send(Body::Start { fromname, contents })
    }

    pub fn send_command(&mut self, cmd: &str, args: serde_json::Value, sel: Vec<Region>) -> Result<()> {
        self.send(Body::Cmd { cmd: cmd.to_string(), args, sel })
    }

    /// Stamps `body` with the routing fields and queues it.
    pub fn send(&mut self, body: Body) -> Result<()> {
        if self.is_dead() {
            return Err(Error::SessionDead);
        }
        let message = self.stamp(body);
        debug!("queueing {} for {}", message, self.remote);
        self.outbox.push_back(message);
        Ok(())
    }

    pub fn stamp(&self, body: Body) -> WireMessage {
        let route = Route {
            fromhost: self.local.host().to_string(),
            fromport: self.local.port(),
            fromid: self.id,
            toid: self.remote_id,
        };
        WireMessage::new(body, route)
    }

    /// The next send, if none is in flight. The job borrows the socket.
    pub fn next_job(&mut self, timeout: Duration) -> Option<SendJob> {
        if self.in_flight || self.is_dead() {
            return None;
        }
        while let Some(message) = self.outbox.pop_front() {
            match encode(&message) {
                Ok(payload) => {
                    self.in_flight = true;
                    return Some(SendJob {
                        stream: self.stream.take(),
                        host: self.remote.host().to_string(),
                        port: self.remote.port(),
                        payload,
                        timeout,
                    });
                }
                Err(err) => error!("dropping {}: {}", message, err),
            }
        }
        None
    }

    /// Takes back the socket from a finished send. A failed send kills the session.
    pub fn on_sent(&mut self, outcome: SendOutcome) -> Result<()> {
        self.in_flight = false;
        match outcome.result {
            Ok(()) => {
                if !self.is_dead() {
                    self.stream = outcome.stream;
                }
                Ok(())
            }
            Err(err) => {
                warn!("{} failed to send: {}", self, err);
                self.kill();
                Err(err)
            }
        }
    }

    pub fn receive(&mut self, message: WireMessage, host: &dyn Host) -> Reaction {
        debug!("{} received data: {}", self, message);
        match message.body {
            Body::StartResponse { accept } => self.receive_start_response(accept, &message.route, host),
            Body::Cmd { cmd, args, sel } => self.receive_command(&cmd, &args, &sel, host),
            // start requests never reach a session, it does not exist yet
            Body::Start { .. } => Reaction::Ignored,
        }
    }

    fn receive_start_response(&mut self, accept: bool, route: &Route, host: &dyn Host) -> Reaction {
        // only an outstanding handshake can be settled
        if !self.is_pending() {
            debug!("{} ignores a handshake reply from {}", self, route.fromhost);
            return Reaction::Ignored;
        }
        self.remote_id = Some(route.fromid);
        self.remote = self.remote.with_host(&route.fromhost);
        host.erase_status(self.id, START_STATUS);
        if accept && self.transition(SessionState::Active) {
            info!("collaboration with {} established", self.remote);
            host.status_message(&format!("Collaboration with {} established", self.remote.name()));
            Reaction::Established
        } else {
            self.kill();
            Reaction::Refused
        }
    }

    fn receive_command(&mut self, cmd: &str, args: &serde_json::Value, sel: &[Region], host: &dyn Host) -> Reaction {
        if let Err(err) = host.run_command(self.id, cmd, args) {
            warn!("{} could not apply {}: {}", self, cmd, err);
            return Reaction::Ignored;
        }
        host.set_selection(self.id, sel);
        Reaction::Applied
    }

    /// Marks the session dead and releases its socket.
    pub fn kill(&mut self) {
        let _ = self.transition(SessionState::Dead);
        self.outbox.clear();
        self.close();
    }

    /// Closes the socket if it is still open.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("{} closed its socket", self);
        }
    }

    fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_become(next) {
            self.state = next;
            true
        } else {
            warn!("{} cannot become {}", self, next);
            false
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let remote_id = match self.remote_id {
            Some(id) => id.to_string(),
            None => "?".to_string(),
        };
        write!(
            f,
            "<Collaboration {}, {}, {}, {}, {}>",
            self.id,
            remote_id,
            self.remote.host(),
            self.remote.port(),
            self.state
        )
    }
}
