//! Readiness probe loop
//!
//! Attempts are scheduled on a fixed grid (`start + n × interval`) so the time
//! spent inside a probe is absorbed by the interval instead of stretching the
//! window. Every attempt also checks that the process is still alive.

use crate::domain::{DomainError, ProbePolicy, ReadinessProbe, Result};
use std::net::SocketAddr;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

/// Probe `address` until it answers, the process exits, or the policy is
/// exhausted. Returns the attempt number that succeeded (1-based).
///
/// `exited` reports the exit status of the service process, if it has exited.
pub async fn wait_until_ready<F>(
    probe: &dyn ReadinessProbe,
    address: SocketAddr,
    policy: &ProbePolicy,
    mut exited: F,
) -> Result<u32>
where
    F: FnMut() -> Option<String>,
{
    let start = Instant::now();

    for attempt in 1..=policy.attempts {
        if let Some(status) = exited() {
            return Err(exited_during_startup(&status));
        }

        if probe.probe(address).await {
            // The listener may belong to someone else if our process just died
            if let Some(status) = exited() {
                return Err(exited_during_startup(&status));
            }
            info!(
                address = %address,
                attempt = attempt,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Service is ready"
            );
            return Ok(attempt);
        }

        debug!(
            address = %address,
            probe = probe.kind(),
            attempt = attempt,
            "Service not ready yet"
        );

        if attempt < policy.attempts {
            sleep_until(start + policy.interval * attempt).await;
        }
    }

    if let Some(status) = exited() {
        return Err(exited_during_startup(&status));
    }

    Err(DomainError::Startup(format!(
        "service did not become ready after {} attempts ({:.1} seconds); check that {} is free and the service logs for errors",
        policy.attempts,
        policy.total_window().as_secs_f64(),
        address
    )))
}

fn exited_during_startup(status: &str) -> DomainError {
    DomainError::Startup(format!("process exited during startup ({})", status))
}
