//! Shared test utilities for E2E tests
//!
//! The lifecycle tests drive a real `ServiceDaemon` with real child processes
//! (`/bin/sh`, `/bin/sleep`) and swap in test doubles at the ports:
//!
//! - probes that are always, never, or eventually ready
//! - process-tree controls that fail or record what they were asked to do
//!
//! ```rust,ignore
//! let temp = TempDir::new().unwrap();
//! let mut daemon = DaemonFixture::new(temp.path(), ShellService::sleeper()).build().await;
//! daemon.start().await.unwrap();
//! ```

use async_trait::async_trait;
use kdc_engine::domain::{
    ConfigEntry, ConfigManager, DomainError, LaunchSpec, PortRequest, PortSpec, ProbePolicy,
    ProcessTreeControl, ReadinessProbe, RenderContext, Result, ServiceDaemon, ServiceDefinition,
    TerminationEscalation,
};
use kdc_engine::infrastructure::DirectProcessTree;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Ports handed to test daemons; kept apart from the unit tests' range
pub const TEST_PORT_LOW: u16 = 24000;
pub const TEST_PORT_HIGH: u16 = 24999;

pub struct AlwaysReady;

#[async_trait]
impl ReadinessProbe for AlwaysReady {
    async fn probe(&self, _address: SocketAddr) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "always"
    }
}

pub struct NeverReady;

#[async_trait]
impl ReadinessProbe for NeverReady {
    async fn probe(&self, _address: SocketAddr) -> bool {
        false
    }

    fn kind(&self) -> &'static str {
        "never"
    }
}

/// Ready once `delay` has passed since the first attempt
pub struct ReadyAfter {
    delay: Duration,
    first: Mutex<Option<Instant>>,
    attempts: AtomicUsize,
}

impl ReadyAfter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            first: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessProbe for ReadyAfter {
    async fn probe(&self, _address: SocketAddr) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut first = self.first.lock().unwrap();
        let start = *first.get_or_insert_with(Instant::now);
        start.elapsed() >= self.delay
    }

    fn kind(&self) -> &'static str {
        "delayed"
    }
}

/// A channel that can neither list nor signal anything
pub struct FailingTree;

#[async_trait]
impl ProcessTreeControl for FailingTree {
    fn channel(&self) -> &'static str {
        "failing"
    }

    async fn list_children(&self, pid: u32) -> Result<Vec<u32>> {
        Err(DomainError::Termination(format!(
            "cannot enumerate children of {}",
            pid
        )))
    }

    async fn signal(&self, pid: u32, _forceful: bool) -> Result<()> {
        Err(DomainError::Termination(format!("cannot signal {}", pid)))
    }
}

/// Delegates to `DirectProcessTree` and records every signalled pid
#[derive(Default)]
pub struct RecordingTree {
    inner: DirectProcessTree,
    signalled: Mutex<Vec<u32>>,
}

impl RecordingTree {
    pub fn signalled(&self) -> Vec<u32> {
        self.signalled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessTreeControl for RecordingTree {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn list_children(&self, pid: u32) -> Result<Vec<u32>> {
        self.inner.list_children(pid).await
    }

    async fn signal(&self, pid: u32, forceful: bool) -> Result<()> {
        self.signalled.lock().unwrap().push(pid);
        self.inner.signal(pid, forceful).await
    }
}

/// `/bin/sh -c <script>`; `$PORT` in the script is the reserved port
pub struct ShellService {
    script: String,
}

impl ShellService {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn sleeper() -> Self {
        Self::new("exec sleep 30")
    }

    /// A shell that forks children of its own and waits on them
    pub fn with_children() -> Self {
        Self::new("sleep 30 & sleep 30 & wait")
    }

    pub fn exits_immediately() -> Self {
        Self::new("exit 3")
    }
}

impl ServiceDefinition for ShellService {
    fn name(&self) -> &str {
        "shell-service"
    }

    fn launch_spec(&self, address: SocketAddr) -> Result<LaunchSpec> {
        Ok(LaunchSpec::new("/bin/sh")
            .args(["-c", self.script.as_str()])
            .env("PORT", address.port().to_string()))
    }
}

/// Writes `service.conf` containing the reserved address
pub struct AddressFile;

#[async_trait]
impl ConfigEntry for AddressFile {
    fn file_name(&self) -> &str {
        "service.conf"
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let address = ctx
            .address
            .ok_or_else(|| DomainError::Configuration("address not known".to_string()))?;
        Ok(format!("listen = {}\n", address))
    }

    fn environment(&self, path: &Path, _ctx: &RenderContext) -> Vec<(String, String)> {
        vec![("SERVICE_CONF".to_string(), path.display().to_string())]
    }
}

/// Builder for a daemon whose managing directory lives under a temp dir
pub struct DaemonFixture {
    directory: PathBuf,
    definition: Arc<dyn ServiceDefinition>,
    probe: Arc<dyn ReadinessProbe>,
    policy: ProbePolicy,
    termination: TerminationEscalation,
    ports: PortSpec,
}

impl DaemonFixture {
    pub fn new(root: &Path, definition: impl ServiceDefinition + 'static) -> Self {
        Self {
            directory: root.join("managed"),
            definition: Arc::new(definition),
            probe: Arc::new(AlwaysReady),
            policy: fast_policy(),
            termination: TerminationEscalation::new(Arc::new(DirectProcessTree::new()), None),
            ports: PortSpec::Range {
                low: TEST_PORT_LOW,
                high: TEST_PORT_HIGH,
            },
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn policy(mut self, policy: ProbePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn termination(mut self, termination: TerminationEscalation) -> Self {
        self.termination = termination;
        self
    }

    pub fn ports(mut self, ports: PortSpec) -> Self {
        self.ports = ports;
        self
    }

    pub async fn build(self) -> ServiceDaemon {
        let mut config = ConfigManager::new(&self.directory);
        config
            .register(AddressFile, None, false)
            .await
            .expect("register config entry");

        ServiceDaemon::builder()
            .definition(self.definition)
            .config_manager(config)
            .port_request(PortRequest::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.ports))
            .probe(self.probe)
            .probe_policy(self.policy)
            .termination(self.termination)
            .reap_timeout(Duration::from_secs(2))
            .build()
            .expect("build daemon")
    }
}

/// 20ms × 10
pub fn fast_policy() -> ProbePolicy {
    ProbePolicy::new(Duration::from_millis(20), 10).expect("valid policy")
}

/// Whether `pid` still exists (zombies count as gone once reaped)
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
