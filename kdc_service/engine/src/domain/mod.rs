pub mod constants;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use error::{DomainError, Result};
pub use ports::{
    ConfigEntry, LaunchSpec, ProcessTreeControl, ReadinessProbe, RenderContext,
    ServiceDefinition,
};
pub use services::{
    ConfigManager, PortReservation, ServiceDaemon, ServiceDaemonBuilder, TerminationEscalation,
    TerminationOutcome,
};
pub use value_objects::{
    CleanupReport, DaemonState, KdcLogLevel, PortRequest, PortSpec, PrincipalSpec, ProbePolicy,
    Transport,
};
