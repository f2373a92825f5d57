pub mod config_manager;
pub mod port_reservation;
pub mod readiness;
pub mod service_daemon;
pub mod termination;

pub use config_manager::ConfigManager;
pub use port_reservation::PortReservation;
pub use readiness::wait_until_ready;
pub use service_daemon::{ServiceDaemon, ServiceDaemonBuilder};
pub use termination::{TerminationEscalation, TerminationOutcome};
