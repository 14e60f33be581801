use crate::{Error, Result};

use tracing::debug;

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Writes one encoded message, connecting first when no stream is held.
#[derive(Debug)]
pub struct SendJob {
    pub stream: Option<TcpStream>,
    pub host: String,
    pub port: u16,
    pub payload: Vec<u8>,
    pub timeout: Duration,
}

/// The stream is handed back on success so the next message can reuse it.
#[derive(Debug)]
pub struct SendOutcome {
    pub stream: Option<TcpStream>,
    pub result: Result<()>,
}

impl SendOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

impl SendJob {
    pub fn run(self) -> SendOutcome {
        let SendJob { stream, host, port, payload, timeout } = self;
        let mut stream = match stream {
            Some(stream) => stream,
            None => match connect(&host, port, timeout) {
                Ok(stream) => stream,
                Err(err) => return SendOutcome { stream: None, result: Err(err) },
            },
        };
        match write(&mut stream, &payload, timeout) {
            Ok(()) => {
                debug!("sent {} bytes to {}:{}", payload.len(), host, port);
                SendOutcome { stream: Some(stream), result: Ok(()) }
            }
            Err(err) => SendOutcome { stream: None, result: Err(err) },
        }
    }
}

/// Connects to the first reachable address of `host:port`, bounded by `timeout` per
/// address.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => {
                debug!("collaboration socket connected: {}", address);
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(err) => Err(Error::IO(err)),
        None => Err(Error::Unresolvable(host.to_string())),
    }
}

fn write(stream: &mut TcpStream, payload: &[u8], timeout: Duration) -> Result<()> {
    stream.set_write_timeout(Some(timeout))?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}
