//! ProbePolicy value object
//! Bounded retry window for the readiness probe

use crate::domain::constants::{DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_INTERVAL_MS};
use crate::domain::{DomainError, Result};
use std::time::Duration;

/// Fixed-interval, fixed-attempt readiness policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Delay between two consecutive attempts
    pub interval: Duration,

    /// Number of attempts before the daemon is declared not ready
    pub attempts: u32,
}

impl ProbePolicy {
    pub fn new(interval: Duration, attempts: u32) -> Result<Self> {
        if attempts == 0 {
            return Err(DomainError::InvalidConfiguration(
                "probe attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self { interval, attempts })
    }

    /// Upper bound of the wait in the failure case
    pub fn total_window(&self) -> Duration {
        self.interval.saturating_mul(self.attempts)
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
            attempts: DEFAULT_PROBE_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_five_seconds() {
        let policy = ProbePolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(100));
        assert_eq!(policy.attempts, 50);
        assert_eq!(policy.total_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(ProbePolicy::new(Duration::from_millis(10), 0).is_err());
        assert!(ProbePolicy::new(Duration::ZERO, 1).is_ok());
    }
}
