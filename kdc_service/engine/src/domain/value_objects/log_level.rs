//! KdcLogLevel value object
//! Verbosity of the managed daemon, derived from the build's debug flags

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum KdcLogLevel {
    Quiet,
    #[default]
    Error,
    Verbose,
    Debug,
    Debug3,
}

impl KdcLogLevel {
    /// Quiet wins; otherwise the most verbose flag present wins
    pub fn from_flags(quiet: bool, verbose: bool, debug: bool, dev_output: bool) -> Self {
        if quiet {
            KdcLogLevel::Quiet
        } else if dev_output {
            KdcLogLevel::Debug3
        } else if debug {
            KdcLogLevel::Debug
        } else if verbose {
            KdcLogLevel::Verbose
        } else {
            KdcLogLevel::Error
        }
    }

    /// Whether the Kerberos library trace should be switched on
    pub fn enables_trace(&self) -> bool {
        *self >= KdcLogLevel::Debug
    }

    /// Whether the daemon's own stdout should be shown
    pub fn shows_output(&self) -> bool {
        *self >= KdcLogLevel::Verbose
    }

    /// Matching filter directive for `tracing-subscriber`
    pub fn filter_directive(&self) -> &'static str {
        match self {
            KdcLogLevel::Quiet => "off",
            KdcLogLevel::Error => "warn",
            KdcLogLevel::Verbose => "info",
            KdcLogLevel::Debug => "debug",
            KdcLogLevel::Debug3 => "trace",
        }
    }
}

impl fmt::Display for KdcLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdcLogLevel::Quiet => write!(f, "QUIET"),
            KdcLogLevel::Error => write!(f, "ERROR"),
            KdcLogLevel::Verbose => write!(f, "VERBOSE"),
            KdcLogLevel::Debug => write!(f, "DEBUG"),
            KdcLogLevel::Debug3 => write!(f, "DEBUG3"),
        }
    }
}
