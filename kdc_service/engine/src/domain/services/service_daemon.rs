//! Service daemon lifecycle
//!
//! IDLE → CONFIGURED → STARTING → LISTENING → STOPPING → STOPPED, with a
//! transition to FAILED from any non-terminal state. Cleanup (config restore
//! and port release) runs exactly once, whichever terminal state is reached.

use crate::domain::constants::DEFAULT_REAP_TIMEOUT_SEC;
use crate::domain::services::readiness::wait_until_ready;
use crate::domain::{
    CleanupReport, ConfigManager, DaemonState, DomainError, LaunchSpec, PortRequest,
    PortReservation, ProbePolicy, ReadinessProbe, Result, ServiceDefinition,
    TerminationEscalation,
};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

pub struct ServiceDaemon {
    definition: Arc<dyn ServiceDefinition>,
    config: ConfigManager,
    port_request: PortRequest,
    probe: Arc<dyn ReadinessProbe>,
    policy: ProbePolicy,
    termination: TerminationEscalation,
    reap_timeout: Duration,

    state: DaemonState,
    reservation: Option<PortReservation>,
    address: Option<SocketAddr>,
    child: Option<Child>,
    pid: Option<u32>,
    last_error: Option<DomainError>,
    cleaned_up: bool,
}

impl ServiceDaemon {
    pub fn builder() -> ServiceDaemonBuilder {
        ServiceDaemonBuilder::default()
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Resolved address; known once configured
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Cause of the transition to FAILED
    pub fn last_error(&self) -> Option<&DomainError> {
        self.last_error.as_ref()
    }

    pub fn config_directory(&self) -> &Path {
        self.config.directory()
    }

    /// Variables a client of this service needs
    pub fn environment(&self) -> Vec<(String, String)> {
        self.config.environment()
    }

    /// IDLE → CONFIGURED: reserve the address and write the configuration
    pub async fn configure(&mut self) -> Result<()> {
        self.expect_state(DaemonState::Idle, DaemonState::Configured)?;

        let reservation = match PortReservation::acquire(&self.port_request).await {
            Ok(reservation) => reservation,
            Err(e) => return Err(self.fail(e)),
        };
        let address = reservation.address();
        self.reservation = Some(reservation);
        self.address = Some(address);
        self.config.set_address(address);

        if let Err(e) = self.config.ensure().await {
            return Err(self.fail(e));
        }

        self.transition(DaemonState::Configured)?;
        info!(
            service = %self.name(),
            address = %address,
            directory = ?self.config.directory(),
            "Service configured"
        );
        Ok(())
    }

    /// CONFIGURED → STARTING → LISTENING. Configures first when still IDLE.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == DaemonState::Idle {
            self.configure().await?;
        }
        self.expect_state(DaemonState::Configured, DaemonState::Starting)?;
        self.transition(DaemonState::Starting)?;

        let result = self.launch_and_probe().await;

        // The child owns the address (or failed to take it) by now
        if let Some(reservation) = self.reservation.as_mut() {
            reservation.release();
        }

        match result {
            Ok(child) => {
                self.child = Some(child);
                self.transition(DaemonState::Listening)?;
                info!(
                    service = %self.name(),
                    pid = ?self.pid,
                    address = ?self.address,
                    "Service is listening"
                );
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Stop the service and clean up. Never fails: problems are logged and
    /// returned as diagnostics.
    pub async fn stop(&mut self) -> CleanupReport {
        let mut report = CleanupReport::new();

        match self.state {
            DaemonState::Idle => {
                debug!(service = %self.name(), "Stop requested before configure, nothing to do");
                return report;
            }
            DaemonState::Configured => {
                self.state = DaemonState::Stopped;
            }
            DaemonState::Starting | DaemonState::Listening | DaemonState::Stopping => {
                self.state = DaemonState::Stopping;
                info!(service = %self.name(), pid = ?self.pid, "Stopping service");
                report.merge(self.terminate_process().await);
                self.state = DaemonState::Stopped;
            }
            DaemonState::Stopped | DaemonState::Failed => {}
        }

        report.merge(self.cleanup());
        info!(service = %self.name(), state = %self.state, diagnostics = %report, "Service stopped");
        report
    }

    async fn launch_and_probe(&mut self) -> Result<Child> {
        let address = match self.reservation.as_ref() {
            Some(reservation) => reservation.address(),
            None => {
                return Err(DomainError::Startup(
                    "no address reserved for the service".to_string(),
                ));
            }
        };
        let spec = self.definition.launch_spec(address)?;
        let mut command = self.build_command(&spec)?;

        // Hand the address over and launch with as little delay as possible
        if let Some(reservation) = self.reservation.as_mut() {
            reservation.handoff();
        }
        let mut child = command.spawn().map_err(|e| {
            error!(command = %spec.display_command(), error = %e, "Failed to spawn service");
            DomainError::Startup(format!("failed to launch {}: {}", spec.program.display(), e))
        })?;
        self.pid = child.id();
        info!(
            service = %self.name(),
            pid = ?self.pid,
            command = %spec.display_command(),
            "Service process spawned"
        );

        if let Ok(Some(status)) = child.try_wait() {
            return Err(DomainError::Startup(format!(
                "process did not start ({})",
                status
            )));
        }

        let ready = wait_until_ready(self.probe.as_ref(), address, &self.policy, || {
            child.try_wait().ok().flatten().map(|status| status.to_string())
        })
        .await;

        match ready {
            Ok(_) => Ok(child),
            Err(e) => {
                self.child = Some(child);
                let report = self.terminate_process().await;
                if !report.is_clean() {
                    warn!(service = %self.name(), diagnostics = %report, "Failed service was not fully terminated");
                }
                Err(e)
            }
        }
    }

    fn build_command(&self, spec: &LaunchSpec) -> Result<Command> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);

        for (key, value) in self.config.environment().into_iter().chain(spec.env.iter().cloned()) {
            command.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        command.stdin(Stdio::null());
        command.stdout(configure_output(spec.stdout.as_deref(), "stdout")?);
        command.stderr(configure_output(spec.stderr.as_deref(), "stderr")?);
        command.kill_on_drop(true);
        Ok(command)
    }

    /// Kill the tree (if the process is still alive) and reap the child
    async fn terminate_process(&mut self) -> CleanupReport {
        let mut report = CleanupReport::new();
        let Some(mut child) = self.child.take() else {
            return report;
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(service = %self.name(), status = %status, "Process already exited");
            return report;
        }

        match child.id() {
            Some(pid) => {
                let outcome = self.termination.terminate(pid).await;
                if !outcome.is_success() {
                    report.push(format!("pid {}: {}", pid, outcome));
                }
            }
            None => debug!(service = %self.name(), "Process already reaped"),
        }

        match tokio::time::timeout(self.reap_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(service = %self.name(), status = %status, "Process reaped"),
            Ok(Err(e)) => report.push(format!("wait for pid {:?}: {}", self.pid, e)),
            Err(_) => {
                error!(
                    service = %self.name(),
                    pid = ?self.pid,
                    timeout_sec = self.reap_timeout.as_secs(),
                    "Process still running after termination"
                );
                report.push(format!(
                    "pid {:?} still running {}s after termination",
                    self.pid,
                    self.reap_timeout.as_secs()
                ));
            }
        }
        report
    }

    /// Restore configuration and release the address, exactly once
    fn cleanup(&mut self) -> CleanupReport {
        if self.cleaned_up {
            return CleanupReport::new();
        }
        self.cleaned_up = true;

        let report = self.config.clean();
        if let Some(mut reservation) = self.reservation.take() {
            reservation.release();
        }
        debug!(service = %self.name(), "Cleanup complete");
        report
    }

    /// Move to FAILED, tear down what was set up and hand the cause back
    fn fail(&mut self, cause: DomainError) -> DomainError {
        error!(
            service = %self.name(),
            state = %self.state,
            error = %cause,
            "Service failed"
        );
        self.state = DaemonState::Failed;
        self.last_error = Some(cause.clone());

        let report = self.cleanup();
        if !report.is_clean() {
            warn!(service = %self.name(), diagnostics = %report, "Cleanup after failure incomplete");
        }
        cause
    }

    fn expect_state(&self, expected: DaemonState, next: DaemonState) -> Result<()> {
        if self.state != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: DaemonState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(service = %self.name(), from = %self.state, to = %to, "State transition");
        self.state = to;
        Ok(())
    }
}

impl Drop for ServiceDaemon {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            warn!(
                service = %self.definition.name(),
                pid = ?self.pid,
                "Service dropped while running, killing it"
            );
            let _ = child.start_kill();
        }
        self.cleanup();
    }
}

impl std::fmt::Debug for ServiceDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDaemon")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("address", &self.address)
            .field("pid", &self.pid)
            .field("config", &self.config)
            .finish()
    }
}

fn configure_output(target: Option<&str>, stream: &str) -> Result<Stdio> {
    match target {
        None | Some("null") => Ok(Stdio::null()),
        Some("inherit") => Ok(Stdio::inherit()),
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    DomainError::Startup(format!(
                        "Failed to open {} file '{}': {}",
                        stream, path, e
                    ))
                })?;
            Ok(Stdio::from(file))
        }
    }
}

#[derive(Default)]
pub struct ServiceDaemonBuilder {
    definition: Option<Arc<dyn ServiceDefinition>>,
    config: Option<ConfigManager>,
    port_request: Option<PortRequest>,
    probe: Option<Arc<dyn ReadinessProbe>>,
    policy: ProbePolicy,
    termination: Option<TerminationEscalation>,
    reap_timeout: Option<Duration>,
}

impl ServiceDaemonBuilder {
    pub fn definition(mut self, definition: Arc<dyn ServiceDefinition>) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn config_manager(mut self, config: ConfigManager) -> Self {
        self.config = Some(config);
        self
    }

    pub fn port_request(mut self, request: PortRequest) -> Self {
        self.port_request = Some(request);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn termination(mut self, termination: TerminationEscalation) -> Self {
        self.termination = Some(termination);
        self
    }

    pub fn reap_timeout(mut self, timeout: Duration) -> Self {
        self.reap_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ServiceDaemon> {
        let missing = |what: &str| DomainError::InvalidConfiguration(format!("{} is required", what));

        Ok(ServiceDaemon {
            definition: self.definition.ok_or_else(|| missing("service definition"))?,
            config: self.config.ok_or_else(|| missing("config manager"))?,
            port_request: self.port_request.ok_or_else(|| missing("port request"))?,
            probe: self.probe.ok_or_else(|| missing("readiness probe"))?,
            policy: self.policy,
            termination: self.termination.ok_or_else(|| missing("termination escalation"))?,
            reap_timeout: self
                .reap_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REAP_TIMEOUT_SEC)),
            state: DaemonState::Idle,
            reservation: None,
            address: None,
            child: None,
            pid: None,
            last_error: None,
            cleaned_up: false,
        })
    }
}
