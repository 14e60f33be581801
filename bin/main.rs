use tracing::{info, warn};
use tracing_subscriber;

use clap::{value_t, App, Arg};

use actix::Actor;

use collab_session::collaborator::{parse_address, Collaborator, DEFAULT_PORT};
use collab_session::commands;
use collab_session::host::Host;
use collab_session::protocol::{Region, ViewId};
use collab_session::server::{Hub, Settings, StartCollaboration};
use collab_session::Result;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

/// A headless host: documents live in memory and everything shown to the user is logged.
struct TerminalHost {
    views: RefCell<BTreeMap<ViewId, String>>,
    file_name: Option<String>,
    accept: bool,
}

impl TerminalHost {
    fn new(contents: String, file_name: Option<String>, accept: bool) -> Self {
        let mut views = BTreeMap::new();
        let _ = views.insert(ViewId(1), contents);
        TerminalHost { views: RefCell::new(views), file_name, accept }
    }
}

impl Host for TerminalHost {
    fn view_contents(&self, view: ViewId) -> String {
        self.views.borrow().get(&view).cloned().unwrap_or_default()
    }

    fn file_name(&self, view: ViewId) -> Option<String> {
        if view == ViewId(1) {
            self.file_name.clone()
        } else {
            None
        }
    }

    fn set_status(&self, view: ViewId, key: &str, text: &str) {
        info!("[{}] {}: {}", view, key, text);
    }

    fn erase_status(&self, _view: ViewId, _key: &str) {}

    fn status_message(&self, text: &str) {
        info!("{}", text);
    }

    fn message_dialog(&self, text: &str) {
        warn!("{}", text);
    }

    fn ok_cancel_dialog(&self, text: &str) -> bool {
        info!("{} {}", text, if self.accept { "yes" } else { "no" });
        self.accept
    }

    fn show_quick_panel(&self, _items: Vec<[String; 2]>) -> Option<usize> {
        None
    }

    fn show_input_panel(&self, _caption: &str) -> Option<String> {
        None
    }

    fn active_view(&self) -> Option<ViewId> {
        Some(ViewId(1))
    }

    fn new_view(&self, contents: &str) -> ViewId {
        let mut views = self.views.borrow_mut();
        let view = ViewId(views.keys().last().map_or(1, |last| last.0 + 1));
        let _ = views.insert(view, contents.to_string());
        info!("opened view {} ({} bytes)", view, contents.len());
        view
    }

    fn run_command(&self, view: ViewId, cmd: &str, args: &serde_json::Value) -> Result<()> {
        info!("[{}] {} {}", view, cmd, args);
        Ok(())
    }

    fn set_selection(&self, view: ViewId, sel: &[Region]) {
        info!("[{}] selection {:?}", view, sel);
    }
}

/// `<config dir>/collab/settings.toml`, when it exists.
fn default_config() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("collab").join("settings.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("collab-node")
        .version("0.1")
        .about("Runs a collaboration node")
        .arg(Arg::with_name("config").short("c").long("config").value_name("FILE").takes_value(true))
        .arg(Arg::with_name("port").short("p").long("port").value_name("PORT").takes_value(true))
        .arg(Arg::with_name("name").short("n").long("name").value_name("NAME").takes_value(true))
        .arg(
            Arg::with_name("connect")
                .long("connect")
                .value_name("HOST[:PORT]")
                .takes_value(true),
        )
        .arg(Arg::with_name("file").short("f").long("file").value_name("PATH").takes_value(true))
        .arg(Arg::with_name("accept").long("accept").help("Accepts every collaboration request"))
        .get_matches();

    let config = matches.value_of("config").map(PathBuf::from).or_else(default_config);
    let mut settings = Settings::new(config.as_deref())?;
    if matches.is_present("port") {
        settings.port = value_t!(matches.value_of("port"), u16).unwrap_or_else(|e| e.exit());
    }
    if let Some(name) = matches.value_of("name") {
        settings.name = Some(name.to_string());
    }
    let connect = match matches.value_of("connect") {
        Some(address) => Some(parse_address(address, DEFAULT_PORT)?),
        None => None,
    };
    let file = matches.value_of("file").map(PathBuf::from);
    let contents = match &file {
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };
    let file_name = file.map(|path| path.display().to_string());
    let accept = matches.is_present("accept");

    let sys = actix::System::new();
    sys.block_on(async move {
        let host = Rc::new(TerminalHost::new(contents, file_name, accept));
        let hub = Hub::new(settings, host).start();

        if let Err(err) = commands::collab_server(&hub, true).await {
            warn!("{}", err);
        }
        if let Some((address, port)) = connect {
            let collaborator = Collaborator::new(&address, Some(port), None);
            match hub.send(StartCollaboration { view: ViewId(1), collaborator }).await {
                Ok(Ok(())) => (),
                Ok(Err(err)) => warn!("{}", err),
                Err(err) => warn!("{}", err),
            }
        }

        let sig = if cfg!(unix) {
            use futures::future::FutureExt;
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt()).unwrap();
            let mut sigterm = signal(SignalKind::terminate()).unwrap();

            futures::select! {
                _ = sigint.recv().fuse() => "SIGINT",
                _ = sigterm.recv().fuse() => "SIGTERM"
            }
        } else {
            tokio::signal::ctrl_c().await.unwrap();
            "Ctrl+C"
        };
        info!(target: "collab", "Got {}, stopping...", sig);

        actix::System::current().stop();
    });
    sys.run().unwrap();

    Ok(())
}
