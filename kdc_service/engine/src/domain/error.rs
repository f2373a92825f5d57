//! Domain-level errors
//! Configure/start failures are surfaced to the owner; stop/cleanup failures
//! are folded into a `CleanupReport` instead of being raised.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Directory or file creation/write failure while generating configs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Launch failure, immediate exit, or readiness timeout
    #[error("Startup error: {0}")]
    Startup(String),

    /// The process tree could not be fully killed
    #[error("Termination error: {0}")]
    Termination(String),

    /// A post-start command (add/delete principal) failed
    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Port unavailable: {0}")]
    PortUnavailable(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Service '{0}' is not running")]
    NotRunning(String),

    #[error("Service with tag '{0}' already exists")]
    DuplicateService(String),

    #[error("Service with tag '{0}' not found")]
    ServiceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
