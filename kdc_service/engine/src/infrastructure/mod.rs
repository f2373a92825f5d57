//! Infrastructure Layer
//!
//! Adapters implementing the ports defined in the domain layer.
//!
//! ## Adapters
//!
//! - `DirectProcessTree` / `SudoProcessTree`: primary and fallback termination channels
//! - `UdpProbe` / `TcpProbe`: socket readiness probes
//! - `OneShotCommand`: run an external tool to completion
//! - `EnvironmentExport`: opt-in export of variables into this process
//! - `KdcOptions`: options from YAML or a build-tool section

pub mod command_runner;
pub mod config;
pub mod direct_process_tree;
pub mod environment;
pub mod privileged_process_tree;
pub mod socket_probe;

pub use command_runner::OneShotCommand;
pub use config::KdcOptions;
pub use direct_process_tree::DirectProcessTree;
pub use environment::EnvironmentExport;
pub use privileged_process_tree::SudoProcessTree;
pub use socket_probe::{TcpProbe, UdpProbe};

use crate::domain::TerminationEscalation;
use std::sync::Arc;

/// Direct kill(2) first, `sudo -n` when that fails
pub fn default_escalation() -> TerminationEscalation {
    TerminationEscalation::new(
        Arc::new(DirectProcessTree::new()),
        Some(Arc::new(SudoProcessTree::new())),
    )
}
