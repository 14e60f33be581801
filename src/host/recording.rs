use super::Host;
use crate::protocol::{Region, ViewId};
use crate::{Error, Result};

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::io;

/// Everything a [RecordingHost] was asked to do, plus the answers it gives to prompts.
#[derive(Debug, Default)]
pub struct Recording {
    pub views: BTreeMap<ViewId, String>,
    pub active: Option<ViewId>,
    pub next_view: u64,
    pub view_status: HashMap<(ViewId, String), String>,
    pub status_messages: Vec<String>,
    pub dialogs: Vec<String>,
    pub prompts: Vec<String>,
    pub commands: Vec<(ViewId, String, serde_json::Value)>,
    pub selections: Vec<(ViewId, Vec<Region>)>,
    /// Answer given to accept/reject prompts.
    pub accept: bool,
    /// Answer given to the collaborator list prompt.
    pub choice: Option<usize>,
    /// Answer given to the free-text prompt.
    pub input: Option<String>,
    /// Command names `run_command` fails on.
    pub reject_commands: Vec<String>,
}

/// An in-memory host which records its calls. Views opened through it are numbered
/// from 100.
#[derive(Debug)]
pub struct RecordingHost {
    inner: RefCell<Recording>,
}

impl RecordingHost {
    pub fn new() -> Self {
        let recording = Recording { next_view: 100, ..Default::default() };
        RecordingHost { inner: RefCell::new(recording) }
    }

    pub fn with_view(self, view: ViewId, contents: &str) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            let _ = inner.views.insert(view, contents.to_string());
            inner.active = Some(view);
        }
        self
    }

    pub fn accepting(self, accept: bool) -> Self {
        self.inner.borrow_mut().accept = accept;
        self
    }

    pub fn record(&self) -> Ref<'_, Recording> {
        self.inner.borrow()
    }

    pub fn record_mut(&self) -> RefMut<'_, Recording> {
        self.inner.borrow_mut()
    }

    pub fn status(&self, view: ViewId, key: &str) -> Option<String> {
        self.inner.borrow().view_status.get(&(view, key.to_string())).cloned()
    }
}

impl Host for RecordingHost {
    fn view_contents(&self, view: ViewId) -> String {
        self.inner.borrow().views.get(&view).cloned().unwrap_or_default()
    }

    fn file_name(&self, _view: ViewId) -> Option<String> {
        None
    }

    fn set_status(&self, view: ViewId, key: &str, text: &str) {
        let _ = self.inner.borrow_mut().view_status.insert((view, key.to_string()), text.to_string());
    }

    fn erase_status(&self, view: ViewId, key: &str) {
        let _ = self.inner.borrow_mut().view_status.remove(&(view, key.to_string()));
    }

    fn status_message(&self, text: &str) {
        self.inner.borrow_mut().status_messages.push(text.to_string());
    }

    fn message_dialog(&self, text: &str) {
        self.inner.borrow_mut().dialogs.push(text.to_string());
    }

    fn ok_cancel_dialog(&self, text: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.prompts.push(text.to_string());
        inner.accept
    }

    fn show_quick_panel(&self, items: Vec<[String; 2]>) -> Option<usize> {
        let mut inner = self.inner.borrow_mut();
        for [name, detail] in items {
            inner.prompts.push(format!("{} {}", name, detail));
        }
        inner.choice
    }

    fn show_input_panel(&self, caption: &str) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        inner.prompts.push(caption.to_string());
        inner.input.clone()
    }

    fn active_view(&self) -> Option<ViewId> {
        self.inner.borrow().active
    }

    fn new_view(&self, contents: &str) -> ViewId {
        let mut inner = self.inner.borrow_mut();
        let view = ViewId(inner.next_view);
        inner.next_view += 1;
        let _ = inner.views.insert(view, contents.to_string());
        inner.active = Some(view);
        view
    }

    fn run_command(&self, view: ViewId, cmd: &str, args: &serde_json::Value) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.reject_commands.iter().any(|rejected| rejected == cmd) {
            return Err(Error::IO(io::Error::new(io::ErrorKind::InvalidInput, format!("unknown command {}", cmd))));
        }
        inner.commands.push((view, cmd.to_string(), args.clone()));
        Ok(())
    }

    fn set_selection(&self, view: ViewId, sel: &[Region]) {
        self.inner.borrow_mut().selections.push((view, sel.to_vec()));
    }
}
