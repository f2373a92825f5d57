//! Ephemeral service lifecycle engine
//!
//! Provisions a disposable Kerberos KDC for a build step and tears it down
//! afterwards. The generic lifecycle core lives in `domain`:
//!
//! - `ConfigManager`: backup, write and restore of generated config files
//! - `PortReservation`: lock + transient bind + handoff of a network address
//! - `ServiceDaemon`: configure → start → probe → listening → stop → cleanup
//! - `TerminationEscalation`: process-tree kill with a privileged fallback
//!
//! `kerberos` plugs the KDC into that core and `application` keeps one
//! provider per build tag.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod kerberos;

pub use application::ProviderRegistry;
pub use domain::{DaemonState, DomainError, Result, ServiceDaemon};
pub use kerberos::KdcServiceProvider;
