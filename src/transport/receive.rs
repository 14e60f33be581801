use crate::{Error, Result};

use std::io::{self, BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// An accepted connection, carried from one receive worker to the next.
#[derive(Debug)]
pub struct Inbound {
    reader: BufReader<TcpStream>,
    /// Bytes of a line whose terminator has not arrived yet.
    partial: Vec<u8>,
    peer: SocketAddr,
}

#[derive(Debug, PartialEq)]
pub enum Received {
    /// One complete line.
    Message(Vec<u8>),
    /// The read timed out before a full line arrived; the connection stays usable.
    Idle,
    /// The peer closed the connection.
    Closed,
}

/// The connection is handed back while it remains open.
#[derive(Debug)]
pub struct ReceiveOutcome {
    pub inbound: Option<Inbound>,
    pub result: Result<Received>,
}

impl Inbound {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Result<Inbound> {
        // accepted sockets may inherit the listener's non-blocking mode
        stream.set_nonblocking(false)?;
        Ok(Inbound { reader: BufReader::new(stream), partial: vec![], peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Blocks for at most `timeout` reading one line of no more than `ceiling` bytes.
    pub fn receive(mut self, ceiling: usize, timeout: Duration) -> ReceiveOutcome {
        match self.read_line(ceiling, timeout) {
            Ok(Received::Closed) => ReceiveOutcome { inbound: None, result: Ok(Received::Closed) },
            Ok(received) => ReceiveOutcome { inbound: Some(self), result: Ok(received) },
            Err(err) => ReceiveOutcome { inbound: None, result: Err(err) },
        }
    }

    fn read_line(&mut self, ceiling: usize, timeout: Duration) -> Result<Received> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        let limit = ceiling.saturating_sub(self.partial.len());
        if limit == 0 {
            return Err(Error::MessageTooLarge(ceiling));
        }
        let read = (&mut self.reader).take(limit as u64).read_until(b'\n', &mut self.partial);
        match read {
            Ok(0) if self.partial.is_empty() => Ok(Received::Closed),
            Ok(_) => {
                if self.partial.last() == Some(&b'\n') {
                    Ok(Received::Message(std::mem::take(&mut self.partial)))
                } else if self.partial.len() >= ceiling {
                    Err(Error::MessageTooLarge(ceiling))
                } else {
                    // end of stream without a terminator
                    Ok(Received::Message(std::mem::take(&mut self.partial)))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut => {
                Ok(Received::Idle)
            }
            Err(err) => Err(Error::IO(err)),
        }
    }
}
