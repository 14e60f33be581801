use crate::transport::{drain_finished, Inbound, ReceiveOutcome, Worker};
use crate::Result;

use tracing::{debug, info, warn};

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

/// Owns the inbound listening socket and the receive workers spawned for accepted
/// connections.
///
/// The listener never loops on its own: the [Hub](super::Hub) drives each poll cycle.
pub struct Listener {
    listener: Option<TcpListener>,
    address: SocketAddr,
    receivers: Vec<(SocketAddr, Worker<ReceiveOutcome>)>,
    quit: bool,
}

impl Listener {
    /// Binds every interface on `port`.
    pub fn open(port: u16) -> Result<Listener> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        let address = listener.local_addr()?;
        info!("server started: {}", address);
        Ok(Listener { listener: Some(listener), address, receivers: vec![], quit: false })
    }

    /// The bound port, which differs from the requested one when that was `0`.
    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// Takes every connection that is ready, without waiting.
    pub fn accept_ready(&mut self) -> Vec<Inbound> {
        let mut accepted = vec![];
        let listener = match &self.listener {
            Some(listener) if !self.quit => listener,
            _ => return accepted,
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => match Inbound::new(stream, peer) {
                    Ok(inbound) => {
                        debug!("accepted connection from {}", peer);
                        accepted.push(inbound);
                    }
                    Err(err) => warn!("dropping connection from {}: {}", peer, err),
                },
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("accept failed: {}", err);
                    break;
                }
            }
        }
        accepted
    }

    /// Spawns a worker blocking on one receive from `inbound`.
    pub fn spawn_receiver(&mut self, inbound: Inbound, ceiling: usize, timeout: Duration) {
        let peer = inbound.peer();
        let worker = Worker::spawn(move || inbound.receive(ceiling, timeout));
        self.receivers.push((peer, worker));
    }

    /// Retires finished receive workers.
    pub fn reap(&mut self) -> Vec<(SocketAddr, Result<ReceiveOutcome>)> {
        drain_finished(&mut self.receivers)
    }

    pub fn in_flight(&self) -> usize {
        self.receivers.len()
    }

    /// Stops accepting. The socket stays open until the receive workers have drained.
    pub fn request_stop(&mut self) {
        debug!("waiting for {} receiver(s) to finish...", self.receivers.len());
        self.quit = true;
    }

    /// Cancels a stop request that has not completed yet.
    pub fn resume(&mut self) {
        self.quit = false;
    }

    pub fn is_stopping(&self) -> bool {
        self.quit
    }

    pub fn close(&mut self) {
        if self.listener.take().is_some() {
            info!("server stopped: {}", self.address);
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Received;
    use std::io::Write;
    use std::net::TcpStream;

    #[actix_rt::test]
    async fn accepts_and_reaps_receivers() {
        let mut listener = Listener::open(0).unwrap();
        assert!(listener.port() > 0);
        assert!(listener.accept_ready().is_empty());

        let mut client = TcpStream::connect(("127.0.0.1", listener.port())).unwrap();
        client.write_all(b"hello\n").unwrap();

        let mut accepted = vec![];
        for _ in 0..100 {
            accepted.extend(listener.accept_ready());
            if !accepted.is_empty() {
                break;
            }
            actix::clock::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(accepted.len(), 1);
        listener.spawn_receiver(accepted.pop().unwrap(), 64, Duration::from_secs(1));

        let mut reaped = vec![];
        for _ in 0..200 {
            reaped.extend(listener.reap());
            if !reaped.is_empty() {
                break;
            }
            actix::clock::sleep(Duration::from_millis(5)).await;
        }
        let (_, outcome) = reaped.pop().unwrap();
        let outcome = outcome.unwrap();
        assert_eq!(outcome.result.unwrap(), Received::Message(b"hello\n".to_vec()));
        assert!(outcome.inbound.is_some());
        assert_eq!(listener.in_flight(), 0);
    }

    #[actix_rt::test]
    async fn stopping_refuses_new_connections() {
        let mut listener = Listener::open(0).unwrap();
        listener.request_stop();
        let _client = TcpStream::connect(("127.0.0.1", listener.port())).unwrap();
        actix::clock::sleep(Duration::from_millis(20)).await;
        assert!(listener.accept_ready().is_empty());
        listener.close();
        assert!(!listener.is_open());
    }

    #[test]
    fn second_bind_on_a_port_fails() {
        let listener = Listener::open(0).unwrap();
        assert!(Listener::open(listener.port()).is_err());
    }
}
