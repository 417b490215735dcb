//! One-shot blocking TCP exchanges.
//!
//! Each call opens its own connection and drops it before returning, whatever the outcome.
//! There is no framing at this layer: a message is everything the peer writes before closing,
//! so only the envelope's own length fields can reveal a truncated message.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use thiserror::Error;
use tracing::debug;

use crate::config::TransportConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write message: {source}")]
    WriteFailed {
        #[source]
        source: io::Error,
    },

    #[error("failed to read message: {source}")]
    ReadFailed {
        #[source]
        source: io::Error,
    },

    #[error("peer sent more than {max} bytes")]
    MessageTooLarge { max: usize },
}

impl TransportError {
    /// Nothing is listening on the endpoint (the emulator side is not running).
    pub fn is_connection_refused(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { source, .. }
                if source.kind() == io::ErrorKind::ConnectionRefused
        )
    }
}

pub trait TraceTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read until the peer closes the stream.
    fn receive(&self) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn connect(&self) -> Result<TcpStream, TransportError> {
        let endpoint = self.config.endpoint();
        let failed = |source| TransportError::ConnectionFailed {
            addr: endpoint.clone(),
            source,
        };

        let addrs: Vec<SocketAddr> = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(failed)?
            .collect();

        let mut last_err = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        );
        for addr in addrs {
            let attempt = match self.config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    stream
                        .set_read_timeout(self.config.io_timeout)
                        .and_then(|()| stream.set_write_timeout(self.config.io_timeout))
                        .map_err(failed)?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = err;
                }
            }
        }
        Err(failed(last_err))
    }
}

impl TraceTransport for TcpTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut stream = self.connect()?;
        stream
            .write_all(bytes)
            .and_then(|()| stream.flush())
            .map_err(|source| TransportError::WriteFailed { source })?;
        debug!(len = bytes.len(), "sent message");

        // The peer may already have hung up after reading everything.
        if let Err(err) = stream.shutdown(Shutdown::Both) {
            debug!(error = %err, "shutdown after send failed");
        }
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let max = self.config.max_message_len;
        let mut stream = self.connect()?;

        let mut buf = Vec::new();
        (&mut stream)
            .take(max as u64 + 1)
            .read_to_end(&mut buf)
            .map_err(|source| TransportError::ReadFailed { source })?;
        if buf.len() > max {
            return Err(TransportError::MessageTooLarge { max });
        }
        debug!(len = buf.len(), "received message");

        if let Err(err) = stream.shutdown(Shutdown::Both) {
            debug!(error = %err, "shutdown after receive failed");
        }
        Ok(buf)
    }
}
