//! The editor hosting the collaboration core.
//!
//! Window and view management, dialogs, status text and edit application all live in
//! the host. The core only ever calls into it from the [Hub](crate::server::Hub) actor.
mod recording;

pub use recording::{Recording, RecordingHost};

use crate::protocol::{Region, ViewId};
use crate::Result;

/// Status key shown on a view while a handshake is outstanding.
pub const START_STATUS: &str = "collab_start";
/// Status key shown on a view while messages are in flight.
pub const MESSAGE_STATUS: &str = "collab";

pub trait Host {
    /// The full text of a view.
    fn view_contents(&self, view: ViewId) -> String;

    fn file_name(&self, view: ViewId) -> Option<String>;

    /// Sets a transient status indicator on a view.
    fn set_status(&self, view: ViewId, key: &str, text: &str);

    fn erase_status(&self, view: ViewId, key: &str);

    /// Shows a transient message in the status bar.
    fn status_message(&self, text: &str);

    fn message_dialog(&self, text: &str);

    /// Asks the user to accept or reject; `true` on accept.
    fn ok_cancel_dialog(&self, text: &str) -> bool;

    /// Shows a list of `[name, detail]` items, returning the selected index.
    fn show_quick_panel(&self, items: Vec<[String; 2]>) -> Option<usize>;

    /// Asks for free text, `None` when cancelled.
    fn show_input_panel(&self, caption: &str) -> Option<String>;

    fn active_view(&self) -> Option<ViewId>;

    /// Opens a new view holding `contents`.
    fn new_view(&self, contents: &str) -> ViewId;

    /// Applies a named edit command to a view.
    fn run_command(&self, view: ViewId, cmd: &str, args: &serde_json::Value) -> Result<()>;

    fn set_selection(&self, view: ViewId, sel: &[Region]);
}
