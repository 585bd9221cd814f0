//! TCP connect probe.
//!
//! A port is open when the three-way handshake completes within the timeout.
//! Refused, unreachable and timed-out attempts are all "not open"; only a
//! failure to obtain a socket or local port is reported as an error.

use crate::error::{ScanError, ScanResult};
use crate::types::Port;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpSocket;
use tokio::time::timeout;
use tracing::trace;

/// Liveness check for one (host, port) pair.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// `Ok(true)` if open, `Ok(false)` if closed or filtered.
    async fn probe(&self, host: IpAddr, port: Port) -> ScanResult<bool>;
}

/// Connect-based probe. Needs no special privileges.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectProbe {
    timeout: Duration,
}

impl TcpConnectProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpConnectProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl PortProbe for TcpConnectProbe {
    async fn probe(&self, host: IpAddr, port: Port) -> ScanResult<bool> {
        let addr = SocketAddr::new(host, port.as_u16());
        let exhausted = |source: io::Error| ScanError::ResourceExhausted {
            host,
            port: port.as_u16(),
            source,
        };

        let socket = match host {
            IpAddr::V4(_) => TcpSocket::new_v4(),
            IpAddr::V6(_) => TcpSocket::new_v6(),
        };
        let socket = match socket {
            Ok(socket) => socket,
            Err(e) if is_exhaustion(&e) => return Err(exhausted(e)),
            Err(e) => {
                trace!(%addr, error = %e, "socket creation failed");
                return Ok(false);
            }
        };

        // The socket is owned by the connect future; dropping either the
        // stream or the timed-out future closes it.
        match timeout(self.timeout, socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(true)
            }
            Ok(Err(e)) if is_exhaustion(&e) => Err(exhausted(e)),
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "port not open");
                Ok(false)
            }
            Err(_) => {
                trace!(%addr, "connect timed out");
                Ok(false)
            }
        }
    }
}

/// Out of descriptors, buffers or ephemeral ports.
#[cfg(unix)]
pub(crate) fn is_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EMFILE
            || code == libc::ENFILE
            || code == libc::ENOBUFS
            || code == libc::ENOMEM
            || code == libc::EADDRNOTAVAIL
    )
}

#[cfg(not(unix))]
pub(crate) fn is_exhaustion(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::OutOfMemory
}
