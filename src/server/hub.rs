use super::listener::Listener;
use super::settings::Settings;

use crate::collaborator::Collaborator;
use crate::host::{Host, MESSAGE_STATUS, START_STATUS};
use crate::protocol::{decode, Region, ViewId};
use crate::session::{Registry, Session, SessionState};
use crate::transport::{drain_finished, Inbound, ReceiveOutcome, Received, SendJob, SendOutcome, Worker};
use crate::{Error, Result};

use super::dispatcher::Dispatch;

use actix::{Actor, AsyncContext, Context, Handler};
use colored::Colorize;
use tracing::{debug, error, info, warn};

use std::net::SocketAddr;
use std::rc::Rc;

/// Who is waiting for a send worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Outbound {
    Session { id: ViewId, token: u64 },
    /// A one-off reply that belongs to no session.
    Detached,
}

/// Owns the registry, the listener and every transport worker, and is the single thread
/// on which any of them is touched.
///
/// Workers are never awaited. The hub re-arms itself with `notify_later`: every
/// `message_poll` while send workers are outstanding, and every `reschedule` while the
/// listener is open or draining.
pub struct Hub {
    pub(super) settings: Settings,
    pub(super) host: Rc<dyn Host>,
    pub(super) registry: Registry,
    pub(super) listener: Option<Listener>,
    /// A stopped listener waiting for its receive workers.
    pub(super) draining: Option<Listener>,
    /// This process as seen by peers, known once the listener is bound.
    pub(super) local: Option<Collaborator>,
    senders: Vec<(Outbound, Worker<SendOutcome>)>,
    polling_senders: bool,
    polling_listener: bool,
}

impl Hub {
    pub fn new(settings: Settings, host: Rc<dyn Host>) -> Self {
        Hub {
            settings,
            host,
            registry: Registry::new(),
            listener: None,
            draining: None,
            local: None,
            senders: vec![],
            polling_senders: false,
            polling_listener: false,
        }
    }

    /// Whether the listener is open and not stopping.
    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    pub(super) fn local(&self) -> Result<Collaborator> {
        match (&self.local, &self.listener) {
            (Some(local), Some(_)) => Ok(local.clone()),
            _ => Err(Error::ListenerNotRunning),
        }
    }

    fn start_server(&mut self, ctx: &mut Context<Self>) -> Result<u16> {
        if let Some(listener) = &self.listener {
            return Ok(listener.port());
        }
        let listener = match self.draining.take() {
            Some(mut listener) => {
                listener.resume();
                listener
            }
            None => match Listener::open(self.settings.port) {
                Ok(listener) => listener,
                Err(err) => {
                    error!("could not open server socket: {}", err);
                    return Err(err);
                }
            },
        };
        let port = listener.port();
        self.local = Some(Collaborator::new(&self.settings.host, Some(port), self.settings.name.clone()));
        self.listener = Some(listener);
        info!("collaboration server {} on port {}", "started".green(), port);
        self.arm_listener(ctx);
        Ok(port)
    }

    fn stop_server(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.request_stop();
            self.draining = Some(listener);
        }
        // no session outlives the listener, queued messages included
        self.registry.kill_all();
    }

    fn start_collaboration(
        &mut self,
        view: ViewId,
        collaborator: Collaborator,
        ctx: &mut Context<Self>,
    ) -> Result<()> {
        let _ = self.start_server(ctx)?;
        let mut session = Session::new(view, collaborator, self.local()?);
        session.start(&*self.host)?;
        let token = session.token();
        if self.registry.register(session) {
            ctx.run_later(self.settings.pending_timeout(), move |hub, _ctx| hub.expire(view, token));
        }
        self.flush(view, ctx);
        Ok(())
    }

    /// Fires when the handshake timeout of the session `(id, token)` runs out.
    fn expire(&mut self, id: ViewId, token: u64) {
        if self.registry.peek(id).map(Session::token) == Some(token) {
            let _ = self.registry.evict_if_pending(id, &*self.host);
        }
    }

    /// Hands the next queued message of `id` to a send worker.
    pub(super) fn flush(&mut self, id: ViewId, ctx: &mut Context<Self>) {
        if !self.is_running() {
            return;
        }
        let timeout = self.settings.io_timeout();
        let (token, job) = match self.registry.peek_mut(id) {
            Some(session) => match session.next_job(timeout) {
                Some(job) => (session.token(), job),
                None => return,
            },
            None => return,
        };
        self.spawn_send(Outbound::Session { id, token }, job, ctx);
        self.show_pending(id);
    }

    pub(super) fn spawn_send(&mut self, outbound: Outbound, job: SendJob, ctx: &mut Context<Self>) {
        self.senders.push((outbound, Worker::spawn(move || job.run())));
        if !self.polling_senders {
            self.polling_senders = true;
            ctx.notify_later(PollSenders, self.settings.message_poll());
        }
    }

    fn poll_senders(&mut self, ctx: &mut Context<Self>) {
        for (outbound, outcome) in drain_finished(&mut self.senders) {
            match outbound {
                Outbound::Session { id, token } => self.sent(id, token, outcome, ctx),
                Outbound::Detached => match outcome {
                    Ok(SendOutcome { result: Ok(()), .. }) => debug!("reply sent"),
                    Ok(SendOutcome { result: Err(err), .. }) | Err(err) => warn!("reply failed: {}", err),
                },
            }
        }
        if self.senders.is_empty() {
            self.polling_senders = false;
        } else {
            ctx.notify_later(PollSenders, self.settings.message_poll());
        }
    }

    fn sent(&mut self, id: ViewId, token: u64, outcome: Result<SendOutcome>, ctx: &mut Context<Self>) {
        let session = match self.registry.find(id, token) {
            Some(session) => session,
            None => {
                debug!("send finished for a session that is gone: {}", id);
                return;
            }
        };
        let outcome = outcome.unwrap_or_else(|err| SendOutcome { stream: None, result: Err(err) });
        match session.on_sent(outcome) {
            Ok(()) => self.flush(id, ctx),
            Err(err) => {
                warn!("{} {}", "collaboration error".red(), err);
                self.host.erase_status(id, START_STATUS);
                self.host.status_message(&format!("Collaboration Error: {}", err));
            }
        }
        self.show_pending(id);
    }

    /// Shows how many messages of `id` have not left yet.
    fn show_pending(&self, id: ViewId) {
        let in_flight = self
            .senders
            .iter()
            .filter(|(outbound, _)| matches!(outbound, Outbound::Session { id: view, .. } if *view == id))
            .count();
        let queued = self.registry.peek(id).map_or(0, Session::queued);
        match in_flight + queued {
            0 => self.host.erase_status(id, MESSAGE_STATUS),
            n => self.host.set_status(id, MESSAGE_STATUS, &format!("collab: {} pending msg(s)", n)),
        }
    }

    fn poll_listener(&mut self, ctx: &mut Context<Self>) {
        let ceiling = self.settings.max_message_size;
        let timeout = self.settings.io_timeout();

        let mut received = vec![];
        if let Some(listener) = self.listener.as_mut() {
            for inbound in listener.accept_ready() {
                listener.spawn_receiver(inbound, ceiling, timeout);
            }
            received = listener.reap();
        }
        for (peer, outcome) in received {
            self.received(peer, outcome, ctx);
        }

        if let Some(draining) = self.draining.as_mut() {
            for (peer, _) in draining.reap() {
                debug!("dropping input from {}, the server is stopping", peer);
            }
            if draining.in_flight() == 0 {
                draining.close();
                self.draining = None;
                info!("collaboration server {}", "stopped".yellow());
            }
        }

        if self.listener.is_some() || self.draining.is_some() {
            ctx.notify_later(PollListener, self.settings.reschedule());
        } else {
            self.polling_listener = false;
        }
    }

    fn arm_listener(&mut self, ctx: &mut Context<Self>) {
        if !self.polling_listener {
            self.polling_listener = true;
            ctx.notify_later(PollListener, self.settings.reschedule());
        }
    }

    fn received(&mut self, peer: SocketAddr, outcome: Result<ReceiveOutcome>, ctx: &mut Context<Self>) {
        let ReceiveOutcome { inbound, result } = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("receiver for {} failed: {}", peer, err);
                return;
            }
        };
        match result {
            Ok(Received::Message(bytes)) => match decode(&bytes) {
                Ok(message) => {
                    debug!("server received data from {}: {}", peer, message);
                    ctx.notify(Dispatch { message });
                }
                Err(err) => warn!("server received bad data from {}: {}", peer, err),
            },
            Ok(Received::Idle) => (),
            Ok(Received::Closed) => debug!("{} closed the connection", peer),
            Err(Error::MessageTooLarge(ceiling)) => {
                warn!("dropping connection from {}: message over {} bytes (max_message_size)", peer, ceiling)
            }
            Err(err) => warn!("receive from {} failed: {}", peer, err),
        }
        if let Some(inbound) = inbound {
            self.rearm(inbound);
        }
    }

    /// Waits for the next message on a connection that is still open.
    fn rearm(&mut self, inbound: Inbound) {
        let ceiling = self.settings.max_message_size;
        let timeout = self.settings.io_timeout();
        if let Some(listener) = self.listener.as_mut() {
            listener.spawn_receiver(inbound, ceiling, timeout);
        }
    }
}

impl Actor for Hub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("hub> started");
    }

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        // dropping closes every session socket and the listeners
        self.registry.clear();
        self.listener = None;
        self.draining = None;
        debug!("hub> stopped");
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct PollSenders;

impl Handler<PollSenders> for Hub {
    type Result = ();

    fn handle(&mut self, _msg: PollSenders, ctx: &mut Context<Self>) -> Self::Result {
        self.poll_senders(ctx);
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct PollListener;

impl Handler<PollListener> for Hub {
    type Result = ();

    fn handle(&mut self, _msg: PollListener, ctx: &mut Context<Self>) -> Self::Result {
        self.poll_listener(ctx);
    }
}

/// Opens the listener if it is not running. Returns the bound port.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<u16>")]
pub struct StartServer;

impl Handler<StartServer> for Hub {
    type Result = Result<u16>;

    fn handle(&mut self, _msg: StartServer, ctx: &mut Context<Self>) -> Self::Result {
        self.start_server(ctx)
    }
}

/// Stops accepting connections. Every session becomes unusable at once; the socket
/// closes after in-flight receives finish.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StopServer;

impl Handler<StopServer> for Hub {
    type Result = ();

    fn handle(&mut self, _msg: StopServer, _ctx: &mut Context<Self>) -> Self::Result {
        self.stop_server();
    }
}

/// Proposes a collaboration on `view` to `collaborator`.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct StartCollaboration {
    pub view: ViewId,
    pub collaborator: Collaborator,
}

impl Handler<StartCollaboration> for Hub {
    type Result = Result<()>;

    fn handle(&mut self, msg: StartCollaboration, ctx: &mut Context<Self>) -> Self::Result {
        self.start_collaboration(msg.view, msg.collaborator, ctx)
    }
}

/// Sends an edit command applied to `view`. Returns whether an active session took it.
#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct SendCommand {
    pub view: ViewId,
    pub cmd: String,
    pub args: serde_json::Value,
    pub sel: Vec<Region>,
}

impl Handler<SendCommand> for Hub {
    type Result = bool;

    fn handle(&mut self, msg: SendCommand, ctx: &mut Context<Self>) -> Self::Result {
        let listening = self.is_running();
        let queued = match self.registry.lookup(msg.view, false, listening) {
            Some(session) => session.send_command(&msg.cmd, msg.args, msg.sel).is_ok(),
            None => false,
        };
        if queued {
            self.flush(msg.view, ctx);
        }
        queued
    }
}

/// The view of a session was closed.
#[derive(Debug, Clone, Message)]
#[rtype(result = "bool")]
pub struct ViewClosed {
    pub view: ViewId,
}

impl Handler<ViewClosed> for Hub {
    type Result = bool;

    fn handle(&mut self, msg: ViewClosed, _ctx: &mut Context<Self>) -> Self::Result {
        let listening = self.is_running();
        self.registry.kill(msg.view, listening)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: ViewId,
    pub remote_id: Option<ViewId>,
    pub state: SessionState,
    pub remote_host: String,
    pub remote_port: u16,
    pub connected: bool,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        SessionInfo {
            id: session.id(),
            remote_id: session.remote_id(),
            state: session.state(),
            remote_host: session.remote().host().to_string(),
            remote_port: session.remote().port(),
            connected: session.is_connected(),
        }
    }
}

/// Looks a session up the way the dispatcher does.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Option<SessionInfo>")]
pub struct Lookup {
    pub view: ViewId,
    pub include_pending: bool,
}

impl Handler<Lookup> for Hub {
    type Result = Option<SessionInfo>;

    fn handle(&mut self, msg: Lookup, _ctx: &mut Context<Self>) -> Self::Result {
        let listening = self.is_running();
        self.registry.lookup(msg.view, msg.include_pending, listening).map(|session| SessionInfo::from(&*session))
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "ServerStatus")]
pub struct GetServerStatus;

#[derive(Debug, Clone, PartialEq, MessageResponse)]
pub struct ServerStatus {
    pub running: bool,
    pub stopping: bool,
    pub port: Option<u16>,
    /// Registry entries, dead ones not yet swept included.
    pub sessions: usize,
    pub in_flight: usize,
}

impl Handler<GetServerStatus> for Hub {
    type Result = ServerStatus;

    fn handle(&mut self, _msg: GetServerStatus, _ctx: &mut Context<Self>) -> Self::Result {
        let open = self.listener.as_ref().or_else(|| self.draining.as_ref());
        ServerStatus {
            running: self.is_running(),
            stopping: self.draining.is_some(),
            port: open.map(Listener::port),
            sessions: self.registry.len(),
            in_flight: self.senders.len() + open.map_or(0, Listener::in_flight),
        }
    }
}
