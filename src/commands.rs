//! Editor commands and event hooks, translated into [Hub] messages.
use crate::collaborator::{parse_address, Collaborator, DEFAULT_PORT};
use crate::host::Host;
use crate::protocol::{Region, ViewId};
use crate::server::{Hub, SendCommand, Settings, StartCollaboration, StartServer, StopServer, ViewClosed};
use crate::Result;

use actix::Addr;
use tracing::{debug, info};

/// Proposes a collaboration on the active view, or on a fresh one when `new` is set.
///
/// With `custom` the user types `host[:port]`; otherwise they pick one of the configured
/// collaborators. Returns `false` when the user cancels.
pub async fn collab_start(
    hub: &Addr<Hub>,
    host: &dyn Host,
    settings: &Settings,
    new: bool,
    custom: bool,
) -> Result<bool> {
    let collaborator = if custom {
        match host.show_input_panel("Collaborate with:") {
            Some(input) => {
                let (address, port) = parse_address(&input, DEFAULT_PORT)?;
                Collaborator::new(&address, Some(port), None)
            }
            None => return Ok(false),
        }
    } else {
        let mut collaborators = Collaborator::from_settings(&settings.collaborators);
        let items = collaborators.iter().map(|c| [c.name().to_string(), c.host().to_string()]).collect();
        match host.show_quick_panel(items) {
            Some(index) if index < collaborators.len() => collaborators.swap_remove(index),
            _ => {
                debug!("no collaborator selected");
                return Ok(false);
            }
        }
    };

    let view = if new {
        host.new_view("")
    } else {
        match host.active_view() {
            Some(view) => view,
            None => host.new_view(""),
        }
    };
    info!("starting collaboration on view {} with {}", view, collaborator);
    hub.send(StartCollaboration { view, collaborator }).await??;
    Ok(true)
}

/// Starts or stops the listener.
pub async fn collab_server(hub: &Addr<Hub>, start: bool) -> Result<()> {
    if start {
        let port = hub.send(StartServer).await??;
        debug!("listening on {}", port);
    } else {
        hub.send(StopServer).await?;
    }
    Ok(())
}

/// A view was closed; its session, if any, dies with it.
pub async fn on_close(hub: &Addr<Hub>, view: ViewId) -> Result<bool> {
    Ok(hub.send(ViewClosed { view }).await?)
}

/// The selection of `view` changed after the edit command `cmd`. Returns whether a live
/// session sent it on.
pub async fn on_selection_modified(
    hub: &Addr<Hub>,
    view: ViewId,
    cmd: &str,
    args: serde_json::Value,
    sel: Vec<Region>,
) -> Result<bool> {
    let msg = SendCommand { view, cmd: cmd.to_string(), args, sel };
    Ok(hub.send(msg).await?)
}
