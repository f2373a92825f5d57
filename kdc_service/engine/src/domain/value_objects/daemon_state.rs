//! DaemonState value object
//! Lifecycle state of one ephemeral service instance

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a service daemon in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DaemonState {
    /// Constructed, nothing written or reserved yet
    #[default]
    Idle,

    /// Address reserved and configuration files written
    Configured,

    /// Process launched, readiness not yet confirmed
    Starting,

    /// Readiness probe succeeded
    Listening,

    /// Process tree is being terminated
    Stopping,

    /// Terminated by its owner
    Stopped,

    /// Configure or start failed; the instance is not reusable
    Failed,
}

impl DaemonState {
    /// Whether the daemon owns a live process handle in this state
    pub fn owns_process(&self) -> bool {
        matches!(
            self,
            DaemonState::Starting | DaemonState::Listening | DaemonState::Stopping
        )
    }

    /// STOPPED and FAILED are final; a new instance must be built to run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, DaemonState::Stopped | DaemonState::Failed)
    }

    pub fn is_listening(&self) -> bool {
        *self == DaemonState::Listening
    }

    /// Validate state transition
    pub fn can_transition_to(&self, new_state: DaemonState) -> bool {
        use DaemonState::*;

        match (self, new_state) {
            (Idle, Configured) => true,
            (Configured, Starting) => true,
            (Starting, Listening) => true,
            (Listening, Stopping) => true,
            (Stopping, Stopped) => true,

            // Owner stops before launch: nothing to terminate
            (Configured, Stopped) => true,

            // Any non-terminal state may fail
            (Idle | Configured | Starting | Listening | Stopping, Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Idle => write!(f, "idle"),
            DaemonState::Configured => write!(f, "configured"),
            DaemonState::Starting => write!(f, "starting"),
            DaemonState::Listening => write!(f, "listening"),
            DaemonState::Stopping => write!(f, "stopping"),
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        assert_eq!(DaemonState::default(), DaemonState::Idle);
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(DaemonState::Idle.can_transition_to(DaemonState::Configured));
        assert!(DaemonState::Configured.can_transition_to(DaemonState::Starting));
        assert!(DaemonState::Starting.can_transition_to(DaemonState::Listening));
        assert!(DaemonState::Listening.can_transition_to(DaemonState::Stopping));
        assert!(DaemonState::Stopping.can_transition_to(DaemonState::Stopped));
    }

    #[test]
    fn test_failure_from_every_live_state() {
        for state in [
            DaemonState::Idle,
            DaemonState::Configured,
            DaemonState::Starting,
            DaemonState::Listening,
            DaemonState::Stopping,
        ] {
            assert!(state.can_transition_to(DaemonState::Failed), "{state}");
        }
    }

    #[test]
    fn test_terminal_states_do_not_restart() {
        assert!(!DaemonState::Failed.can_transition_to(DaemonState::Starting));
        assert!(!DaemonState::Failed.can_transition_to(DaemonState::Configured));
        assert!(!DaemonState::Stopped.can_transition_to(DaemonState::Starting));
        assert!(!DaemonState::Stopped.can_transition_to(DaemonState::Failed));
    }

    #[test]
    fn test_invalid_shortcuts() {
        assert!(!DaemonState::Idle.can_transition_to(DaemonState::Listening));
        assert!(!DaemonState::Configured.can_transition_to(DaemonState::Listening));
        assert!(!DaemonState::Listening.can_transition_to(DaemonState::Stopped));
    }

    #[test]
    fn test_owns_process() {
        assert!(DaemonState::Starting.owns_process());
        assert!(DaemonState::Listening.owns_process());
        assert!(DaemonState::Stopping.owns_process());
        assert!(!DaemonState::Configured.owns_process());
        assert!(!DaemonState::Stopped.owns_process());
    }

    #[test]
    fn test_display() {
        assert_eq!(DaemonState::Listening.to_string(), "listening");
        assert_eq!(DaemonState::Failed.to_string(), "failed");
    }
}
