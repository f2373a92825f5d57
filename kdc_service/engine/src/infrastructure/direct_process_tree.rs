//! Direct process-tree control
//! Enumerates children through /proc (Linux) or `ps`, signals with kill(2)

use crate::domain::ports::children_from_table;
use crate::domain::{DomainError, ProcessTreeControl, Result};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectProcessTree;

impl DirectProcessTree {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessTreeControl for DirectProcessTree {
    fn channel(&self) -> &'static str {
        "direct"
    }

    async fn list_children(&self, pid: u32) -> Result<Vec<u32>> {
        #[cfg(target_os = "linux")]
        {
            let children = tokio::task::spawn_blocking(move || children_from_proc(pid))
                .await
                .map_err(|e| DomainError::Termination(format!("child scan aborted: {}", e)))??;
            debug!(pid = pid, children = ?children, "Scanned /proc for children");
            Ok(children)
        }

        #[cfg(not(target_os = "linux"))]
        {
            use crate::infrastructure::command_runner::OneShotCommand;

            let table = OneShotCommand::new("ps")
                .args(["-A", "-o", "pid=,ppid="])
                .run()
                .await
                .map_err(|e| DomainError::Termination(e.to_string()))?;
            let children = children_from_table(&table, pid);
            debug!(pid = pid, children = ?children, "Listed children with ps");
            Ok(children)
        }
    }

    async fn signal(&self, pid: u32, forceful: bool) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            let signal = if forceful {
                Signal::SIGKILL
            } else {
                Signal::SIGTERM
            };
            let raw = i32::try_from(pid)
                .map_err(|_| DomainError::Termination(format!("pid {} out of range", pid)))?;

            match kill(Pid::from_raw(raw), signal) {
                Ok(()) => {
                    debug!(pid = pid, signal = %signal, "Signal sent");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pid = pid, "Process already gone");
                    Ok(())
                }
                Err(e) => Err(DomainError::Termination(format!(
                    "Failed to send {} to {}: {}",
                    signal, pid, e
                ))),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = forceful;
            Err(DomainError::Termination(format!(
                "signalling pid {} is not supported on this platform",
                pid
            )))
        }
    }
}

/// Children of `parent` according to /proc/<pid>/stat
#[cfg(target_os = "linux")]
fn children_from_proc(parent: u32) -> Result<Vec<u32>> {
    let entries = std::fs::read_dir("/proc")
        .map_err(|e| DomainError::Termination(format!("Failed to read /proc: {}", e)))?;

    let mut table = String::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };
        // Processes may vanish while scanning
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(ppid) = ppid_from_stat(&stat) {
            table.push_str(&format!("{} {}\n", pid, ppid));
        }
    }
    Ok(children_from_table(&table, parent))
}

/// `pid (comm) state ppid ...`; comm may itself contain spaces and parens
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn ppid_from_stat(stat: &str) -> Option<u32> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().nth(1)?.parse().ok()
}
