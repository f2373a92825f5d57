//! E2E tests for termination escalation
//!
//! When the primary channel cannot kill the tree, the fallback channel is
//! used and the daemon still reaches STOPPED.

use kdc_e2e_tests::{eventually, process_alive, DaemonFixture, FailingTree, RecordingTree, ShellService};
use kdc_engine::domain::{DaemonState, ProcessTreeControl, TerminationEscalation};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_fallback_kills_when_primary_fails() {
    let temp = TempDir::new().unwrap();
    let fallback = Arc::new(RecordingTree::default());
    let escalation = TerminationEscalation::new(
        Arc::new(FailingTree),
        Some(fallback.clone() as Arc<dyn ProcessTreeControl>),
    );

    let mut daemon = DaemonFixture::new(temp.path(), ShellService::sleeper())
        .termination(escalation)
        .build()
        .await;
    daemon.start().await.unwrap();
    let pid = daemon.pid().unwrap();

    let report = daemon.stop().await;
    assert!(report.is_clean(), "{}", report);
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert_eq!(fallback.signalled(), vec![pid]);
    assert!(eventually(Duration::from_secs(2), || !process_alive(pid)).await);
}

#[tokio::test]
async fn test_fallback_kills_children_before_parent() {
    let temp = TempDir::new().unwrap();
    let fallback = Arc::new(RecordingTree::default());
    let escalation = TerminationEscalation::new(
        Arc::new(FailingTree),
        Some(fallback.clone() as Arc<dyn ProcessTreeControl>),
    );

    let mut daemon = DaemonFixture::new(temp.path(), ShellService::with_children())
        .termination(escalation)
        .build()
        .await;
    daemon.start().await.unwrap();
    let pid = daemon.pid().unwrap();

    // Let the shell fork its sleepers
    let direct = kdc_engine::infrastructure::DirectProcessTree::new();
    for _ in 0..200 {
        if direct.list_children(pid).await.unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    daemon.stop().await;
    let signalled = fallback.signalled();
    assert_eq!(signalled.len(), 3, "{:?}", signalled);
    assert_eq!(signalled.last(), Some(&pid));
}

#[tokio::test]
async fn test_both_channels_failing_still_stops() {
    let temp = TempDir::new().unwrap();
    let escalation =
        TerminationEscalation::new(Arc::new(FailingTree), Some(Arc::new(FailingTree)));

    let mut daemon = DaemonFixture::new(temp.path(), ShellService::sleeper())
        .termination(escalation)
        .build()
        .await;
    daemon.start().await.unwrap();
    let pid = daemon.pid().unwrap();

    // Nothing could kill it: the failure is reported, not raised
    let report = daemon.stop().await;
    assert!(!report.is_clean());
    assert_eq!(daemon.state(), DaemonState::Stopped);

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    )
    .ok();
}
