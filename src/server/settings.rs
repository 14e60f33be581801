use crate::collaborator::DEFAULT_PORT;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use std::path::Path;
use std::time::Duration;

/// Largest line accepted by a receive worker.
pub const DEFAULT_SIZE: usize = 4096;

// For explanation, see issue: https://github.com/serde-rs/serde/issues/368
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_size() -> usize {
    DEFAULT_SIZE
}
fn default_pending_timeout() -> u64 {
    5000
}
fn default_reschedule() -> u64 {
    500
}
fn default_message_poll() -> u64 {
    20
}
fn default_io_timeout() -> u64 {
    5000
}

/// A configured collaborator. Entries without a host are ignored.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CollaboratorSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The name shown to peers, defaults to the advertised host.
    #[serde(default)]
    pub name: Option<String>,
    /// The host peers reach this process on.
    #[serde(default = "default_host")]
    pub host: String,
    /// The listening port; `0` picks an ephemeral one.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub collaborators: Vec<CollaboratorSettings>,
    /// Longest line a receive worker accepts, in bytes. A `start` request carries the
    /// whole document, so larger documents are refused at the receiver and the
    /// proposer sees a timeout.
    #[serde(default = "default_size")]
    pub max_message_size: usize,
    /// How long a handshake may stay unanswered.
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_ms: u64,
    /// Listener poll cycle.
    #[serde(default = "default_reschedule")]
    pub reschedule_ms: u64,
    /// Poll cycle for outstanding send workers.
    #[serde(default = "default_message_poll")]
    pub message_poll_ms: u64,
    /// Bound on each blocking connect, read and write.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            name: None,
            host: default_host(),
            port: default_port(),
            collaborators: vec![],
            max_message_size: default_size(),
            pending_timeout_ms: default_pending_timeout(),
            reschedule_ms: default_reschedule(),
            message_poll_ms: default_message_poll(),
            io_timeout_ms: default_io_timeout(),
        }
    }
}

impl Settings {
    /// Loads the settings file at `path` if given, then `COLLAB_*` environment overrides.
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder.add_source(Environment::with_prefix("COLLAB")).build()?.try_deserialize()
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_timeout_ms)
    }

    pub fn reschedule(&self) -> Duration {
        Duration::from_millis(self.reschedule_ms)
    }

    pub fn message_poll(&self) -> Duration {
        Duration::from_millis(self.message_poll_ms)
    }

    /// Never zero: sockets reject a zero timeout.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_protocol() {
        let settings = Settings::default();
        assert_eq!(settings.port, 22000);
        assert_eq!(settings.max_message_size, 4096);
        assert_eq!(settings.pending_timeout(), Duration::from_millis(5000));
        assert_eq!(settings.reschedule(), Duration::from_millis(500));
        assert_eq!(settings.message_poll(), Duration::from_millis(20));
    }

    #[test]
    fn reads_a_settings_file() {
        let path = std::env::temp_dir().join(format!("collab-settings-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
name = "alice"
port = 23000

[[collaborators]]
name = "bob"
host = "10.0.0.2"

[[collaborators]]
port = 1
"#
        )
        .unwrap();

        let settings = Settings::new(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.name.as_deref(), Some("alice"));
        assert_eq!(settings.port, 23000);
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.collaborators.len(), 2);
        assert_eq!(settings.collaborators[0].host.as_deref(), Some("10.0.0.2"));
        assert_eq!(settings.collaborators[1].host, None);
        assert_eq!(settings.pending_timeout_ms, 5000);
    }
}
