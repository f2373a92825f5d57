//! ReadinessProbe port
//! A single "is the service accepting traffic yet?" check

use async_trait::async_trait;
use std::net::SocketAddr;

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// One attempt; `true` once the service answers on `address`
    async fn probe(&self, address: SocketAddr) -> bool;

    /// Short name used in logs
    fn kind(&self) -> &'static str;
}
