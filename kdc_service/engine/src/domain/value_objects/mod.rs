pub mod cleanup_report;
pub mod daemon_state;
pub mod log_level;
pub mod port_spec;
pub mod principal;
pub mod probe_policy;

pub use cleanup_report::CleanupReport;
pub use daemon_state::DaemonState;
pub use log_level::KdcLogLevel;
pub use port_spec::{PortRequest, PortSpec, Transport};
pub use principal::{PrincipalSpec, strip_realm};
pub use probe_policy::ProbePolicy;
