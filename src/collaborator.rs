//! Peer identities: where a collaborator listens and what to call it.
use crate::server::CollaboratorSettings;
use crate::{Error, Result};

use tracing::warn;

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

/// The port a collaborator listens on when none is configured.
pub const DEFAULT_PORT: u16 = 22000;

/// A collaborator represented by host, port, and name. The only required data is the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    /// Resolved address, or the raw host string when resolution failed.
    host: String,
    port: u16,
    name: Option<String>,
}

impl Collaborator {
    /// Resolves `host` once. A missing or zero port falls back to [DEFAULT_PORT].
    pub fn new(host: &str, port: Option<u16>, name: Option<String>) -> Self {
        let port = match port {
            Some(port) if port != 0 => port,
            _ => DEFAULT_PORT,
        };
        Collaborator { host: resolve(host), port, name }
    }

    /// Builds the configured collaborator list, leaving out entries without a host.
    pub fn from_settings(entries: &[CollaboratorSettings]) -> Vec<Collaborator> {
        entries
            .iter()
            .filter_map(|entry| {
                let host = entry.host.as_ref()?;
                Some(Collaborator::new(host, entry.port, entry.name.clone()))
            })
            .collect()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The display name, defaulting to the host.
    pub fn name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => &self.host,
        }
    }

    /// The same collaborator reached through a different host.
    pub fn with_host(&self, host: &str) -> Self {
        Collaborator { host: resolve(host), port: self.port, name: self.name.clone() }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name(), self.host, self.port)
    }
}

/// Resolves a host name to an IP string, preferring IPv4. Failure is not fatal: the raw
/// host is returned.
pub fn resolve(host: &str) -> String {
    match (host, 0).to_socket_addrs() {
        Ok(addresses) => {
            let addresses: Vec<SocketAddr> = addresses.collect();
            match addresses.iter().find(|a| a.is_ipv4()).or_else(|| addresses.first()) {
                Some(address) => address.ip().to_string(),
                None => host.to_string(),
            }
        }
        Err(err) => {
            warn!("could not resolve host {}: {}", host, err);
            host.to_string()
        }
    }
}

/// Parses a `host[:port]` address typed by the user.
pub fn parse_address(input: &str, default_port: u16) -> Result<(String, u16)> {
    let mut parts = input.splitn(2, ':');
    let host = parts.next().unwrap_or("").trim();
    if host.is_empty() {
        return Err(Error::InvalidAddress(input.to_string()));
    }
    let port = match parts.next() {
        Some(port) => port.trim().parse::<u16>().map_err(|_| Error::InvalidAddress(input.to_string()))?,
        None => default_port,
    };
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_host() {
        let c = Collaborator::new("127.0.0.1", Some(23000), None);
        assert_eq!(c.name(), "127.0.0.1");
        assert_eq!(c.port(), 23000);

        let c = Collaborator::new("127.0.0.1", None, Some("bob".to_string()));
        assert_eq!(c.name(), "bob");
        assert_eq!(c.port(), DEFAULT_PORT);
    }

    #[test]
    fn zero_port_falls_back_to_default() {
        assert_eq!(Collaborator::new("127.0.0.1", Some(0), None).port(), DEFAULT_PORT);
    }

    #[test]
    fn resolves_localhost() {
        let c = Collaborator::new("localhost", None, None);
        assert!(c.host() == "127.0.0.1" || c.host() == "::1");
    }

    #[test]
    fn unresolvable_host_is_kept_verbatim() {
        let c = Collaborator::new("no-such-host.invalid", None, None);
        assert_eq!(c.host(), "no-such-host.invalid");
    }

    #[test]
    fn skips_entries_without_host() {
        let entries = vec![
            CollaboratorSettings { host: None, port: Some(1), name: Some("ghost".to_string()) },
            CollaboratorSettings {
                host: Some("127.0.0.1".to_string()),
                port: Some(22001),
                name: Some("alice".to_string()),
            },
        ];
        let collaborators = Collaborator::from_settings(&entries);
        assert_eq!(collaborators.len(), 1);
        assert_eq!(collaborators[0].name(), "alice");
        assert_eq!(collaborators[0].port(), 22001);
    }

    #[test]
    fn parses_host_and_port() {
        assert_eq!(parse_address("example.org:23000", 22000).unwrap(), ("example.org".to_string(), 23000));
        assert_eq!(parse_address(" example.org ", 22000).unwrap(), ("example.org".to_string(), 22000));
        assert_eq!(parse_address("10.0.0.1 : 9", 22000).unwrap(), ("10.0.0.1".to_string(), 9));
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(matches!(parse_address("", 22000), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("host:port", 22000), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("host:70000", 22000), Err(Error::InvalidAddress(_))));
    }
}
