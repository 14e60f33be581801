use super::hub::{Hub, Outbound};

use crate::collaborator::Collaborator;
use crate::protocol::{encode, Body, Route, ViewId, WireMessage};
use crate::session::{Reaction, Session};
use crate::transport::SendJob;

use actix::{Context, Handler};
use tracing::{debug, error, info, warn};

/// A decoded message from a peer, routed on the hub's thread.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct Dispatch {
    pub message: WireMessage,
}

impl Handler<Dispatch> for Hub {
    type Result = ();

    fn handle(&mut self, msg: Dispatch, ctx: &mut Context<Self>) -> Self::Result {
        if matches!(msg.message.body, Body::Start { .. }) {
            self.receive_start_request(msg.message, ctx)
        } else {
            self.forward(msg.message)
        }
    }
}

impl Hub {
    /// Asks the user whether to join the collaboration a peer proposes. Accepting opens a
    /// new view with the proposed contents and replies through the new session; declining
    /// replies through a one-off connection.
    fn receive_start_request(&mut self, message: WireMessage, ctx: &mut Context<Self>) {
        let WireMessage { body, route } = message;
        let (fromname, contents) = match body {
            Body::Start { fromname, contents } => (fromname, contents),
            _ => return,
        };
        let local = match self.local() {
            Ok(local) => local,
            Err(err) => {
                warn!("start request from {}:{} dropped: {}", route.fromhost, route.fromport, err);
                return;
            }
        };
        let accept = self.host.ok_cancel_dialog(&format!("{} wishes to collaborate, continue?", fromname));
        let remote = Collaborator::new(&route.fromhost, Some(route.fromport), Some(fromname));

        if !accept {
            info!("declined collaboration with {}", remote);
            self.decline(&route, &remote, &local, ctx);
            return;
        }

        let view = self.host.new_view(&contents);
        let mut session = Session::accepted(view, route.fromid, remote, local);
        if let Err(err) = session.start(&*self.host).and_then(|()| session.send(Body::StartResponse { accept: true })) {
            error!("could not answer {}: {}", session, err);
            return;
        }
        let _ = self.registry.register(session);
        self.flush(view, ctx);
    }

    fn decline(&mut self, route: &Route, remote: &Collaborator, local: &Collaborator, ctx: &mut Context<Self>) {
        let reply = WireMessage::new(
            Body::StartResponse { accept: false },
            Route {
                fromhost: local.host().to_string(),
                fromport: local.port(),
                fromid: ViewId::UNASSIGNED,
                toid: Some(route.fromid),
            },
        );
        match encode(&reply) {
            Ok(payload) => {
                let job = SendJob {
                    stream: None,
                    host: remote.host().to_string(),
                    port: remote.port(),
                    payload,
                    timeout: self.settings.io_timeout(),
                };
                self.spawn_send(Outbound::Detached, job, ctx);
            }
            Err(err) => error!("could not encode {}: {}", reply, err),
        }
    }

    /// Hands a message to the session its `toid` names, pending ones included.
    fn forward(&mut self, message: WireMessage) {
        let id = match message.route.toid {
            Some(id) => id,
            None => {
                debug!("dropping {}: no target view", message);
                return;
            }
        };
        let listening = self.is_running();
        let reaction = match self.registry.lookup(id, true, listening) {
            Some(session) => session.receive(message, &*self.host),
            None => {
                debug!("no appropriate collaboration to receive {}", message);
                return;
            }
        };
        if reaction == Reaction::Refused {
            if let Some(session) = self.registry.remove(id) {
                self.host.status_message(&format!("Collaboration with {} was declined", session.remote().name()));
            }
        }
    }
}
