//! Socket readiness probes
//!
//! UDP has no handshake: a datagram is sent on a connected socket and only an
//! ICMP port-unreachable (surfacing as `ConnectionRefused`) counts as "not
//! listening". A reply or silence until the timeout both count as ready.

use crate::domain::ReadinessProbe;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

/// Datagram sent to the service; any well-behaved server drops it
const PROBE_DATAGRAM: &[u8] = &[0];

#[derive(Debug, Clone, Copy)]
pub struct UdpProbe {
    reply_timeout: Duration,
}

impl UdpProbe {
    pub fn new(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl ReadinessProbe for UdpProbe {
    async fn probe(&self, address: SocketAddr) -> bool {
        let local: SocketAddr = if address.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = match UdpSocket::bind(local).await {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "Failed to bind probe socket");
                return false;
            }
        };
        if let Err(e) = socket.connect(address).await {
            debug!(address = %address, error = %e, "Failed to connect probe socket");
            return false;
        }
        if let Err(e) = socket.send(PROBE_DATAGRAM).await {
            debug!(address = %address, error = %e, "Probe datagram not sent");
            return false;
        }

        let mut buf = [0u8; 1500];
        match timeout(self.reply_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => false,
            Ok(Err(e)) => {
                debug!(address = %address, error = %e, "Probe receive failed");
                false
            }
            // No refusal: something owns the port
            Err(_) => true,
        }
    }

    fn kind(&self) -> &'static str {
        "udp"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn probe(&self, address: SocketAddr) -> bool {
        match timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(address = %address, error = %e, "TCP probe refused");
                false
            }
            Err(_) => {
                debug!(address = %address, "TCP probe timed out");
                false
            }
        }
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}
