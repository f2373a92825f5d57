//! Port reservation
//!
//! An address is reserved by taking a process-wide lock keyed by the address
//! and binding it transiently to prove it is free. `handoff` drops the bind
//! right before the consumer is launched; the lock is held until `release`.
//! An external process cannot adopt our socket, so the window between
//! `handoff` and the child's own bind is narrowed, not closed.

use crate::domain::{DomainError, PortRequest, PortSpec, Result, Transport};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

type AddressLock = Arc<AsyncMutex<()>>;

/// One lock per address, shared by every daemon in this process
static PORT_LOCKS: Lazy<Mutex<HashMap<SocketAddr, AddressLock>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(address: SocketAddr) -> AddressLock {
    let mut table = PORT_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    table.entry(address).or_default().clone()
}

/// Drop the table entry once nobody holds or waits for it
fn forget_lock(address: SocketAddr) {
    let mut table = PORT_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(lock) = table.get(&address) {
        if Arc::strong_count(lock) == 1 {
            table.remove(&address);
        }
    }
}

/// Exclusive ownership of one resolved address
#[derive(Debug)]
pub struct PortReservation {
    address: SocketAddr,
    transport: Transport,
    guard: Option<OwnedMutexGuard<()>>,
    udp: Option<UdpSocket>,
    tcp: Option<TcpListener>,
}

impl PortReservation {
    /// Resolve, lock and bind an address.
    ///
    /// An exact port waits for any other holder to release it. A range takes
    /// the first port that is neither locked nor bound by someone else.
    pub async fn acquire(request: &PortRequest) -> Result<Self> {
        match request.ports {
            PortSpec::Exact(port) => {
                let address = SocketAddr::new(request.host, port);
                debug!(address = %address, "Waiting for port lock");
                let guard = lock_for(address).lock_owned().await;

                let mut reservation = Self::locked(address, request.transport, guard);
                reservation.bind().map_err(|e| {
                    DomainError::PortUnavailable(format!("{} is in use: {}", address, e))
                })?;
                info!(address = %address, "Port reserved");
                Ok(reservation)
            }
            PortSpec::Range { .. } => {
                for port in request.ports.candidates() {
                    let address = SocketAddr::new(request.host, port);
                    let Ok(guard) = lock_for(address).try_lock_owned() else {
                        debug!(address = %address, "Port locked by another service, skipping");
                        continue;
                    };

                    let mut reservation = Self::locked(address, request.transport, guard);
                    match reservation.bind() {
                        Ok(()) => {
                            info!(address = %address, "Port reserved");
                            return Ok(reservation);
                        }
                        Err(e) => {
                            debug!(address = %address, error = %e, "Port in use, skipping");
                        }
                    }
                }
                Err(DomainError::PortUnavailable(format!(
                    "no free port in {}",
                    request
                )))
            }
        }
    }

    fn locked(address: SocketAddr, transport: Transport, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            address,
            transport,
            guard: Some(guard),
            udp: None,
            tcp: None,
        }
    }

    fn bind(&mut self) -> std::io::Result<()> {
        if self.transport.includes_udp() {
            self.udp = Some(UdpSocket::bind(self.address)?);
        }
        if self.transport.includes_tcp() {
            self.tcp = Some(TcpListener::bind(self.address)?);
        }
        Ok(())
    }

    /// Give up the transient bind. The consumer must be launched right away.
    pub fn handoff(&mut self) -> SocketAddr {
        self.udp = None;
        self.tcp = None;
        debug!(address = %self.address, "Port handed off");
        self.address
    }

    /// Drop the bind (if still held) and then the lock
    pub fn release(&mut self) {
        self.udp = None;
        self.tcp = None;
        if let Some(guard) = self.guard.take() {
            drop(guard);
            forget_lock(self.address);
            debug!(address = %self.address, "Port lock released");
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_locked(&self) -> bool {
        self.guard.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.udp.is_some() || self.tcp.is_some()
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn free_udp_port() -> u16 {
        UdpSocket::bind((LOCALHOST, 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn exact(port: u16) -> PortRequest {
        PortRequest::new(LOCALHOST, PortSpec::Exact(port)).with_transport(Transport::Udp)
    }

    #[tokio::test]
    async fn test_bind_held_until_handoff() {
        let port = free_udp_port();
        let mut reservation = PortReservation::acquire(&exact(port)).await.unwrap();
        assert!(reservation.is_locked());
        assert!(reservation.is_bound());
        assert!(UdpSocket::bind((LOCALHOST, port)).is_err());

        let address = reservation.handoff();
        assert_eq!(address, SocketAddr::new(LOCALHOST, port));
        assert!(!reservation.is_bound());
        assert!(reservation.is_locked());
        assert!(UdpSocket::bind(address).is_ok());

        reservation.release();
        assert!(!reservation.is_locked());
        // Release twice is harmless
        reservation.release();
    }

    #[tokio::test]
    async fn test_exact_port_in_use() {
        let holder = UdpSocket::bind((LOCALHOST, 0)).unwrap();
        let port = holder.local_addr().unwrap().port();
        let result = PortReservation::acquire(&exact(port)).await;
        assert!(matches!(result, Err(DomainError::PortUnavailable(_))));
    }

    #[tokio::test]
    async fn test_range_skips_locked_port() {
        let base = free_udp_port().min(65_000);
        let request = PortRequest::new(LOCALHOST, PortSpec::range(base, base + 50).unwrap())
            .with_transport(Transport::Udp);

        let first = PortReservation::acquire(&request).await.unwrap();
        let second = PortReservation::acquire(&request).await.unwrap();

        assert_ne!(first.address(), second.address());
        assert!(second.address().port() <= base + 50);
    }

    #[tokio::test]
    async fn test_range_exhausted() {
        let holder = UdpSocket::bind((LOCALHOST, 0)).unwrap();
        let port = holder.local_addr().unwrap().port();
        let request = PortRequest::new(LOCALHOST, PortSpec::range(port, port).unwrap())
            .with_transport(Transport::Udp);

        let result = PortReservation::acquire(&request).await;
        assert!(matches!(result, Err(DomainError::PortUnavailable(_))));
    }

    #[tokio::test]
    async fn test_same_address_blocks_until_release() {
        let port = free_udp_port();
        let mut first = PortReservation::acquire(&exact(port)).await.unwrap();

        let waiter = tokio::spawn(async move { PortReservation::acquire(&exact(port)).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        first.release();
        let second = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("second acquire should proceed after release")
            .unwrap()
            .unwrap();
        assert_eq!(second.address().port(), port);
    }

    #[tokio::test]
    async fn test_release_forgets_lock_entry() {
        let port = free_udp_port();
        let address = SocketAddr::new(LOCALHOST, port);
        let reservation = PortReservation::acquire(&exact(port)).await.unwrap();
        assert!(PORT_LOCKS.lock().unwrap().contains_key(&address));

        drop(reservation);
        assert!(!PORT_LOCKS.lock().unwrap().contains_key(&address));
    }
}
