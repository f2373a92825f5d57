//! Privileged process-tree control
//! Same two steps as the direct channel, run through `sudo -n` so a missing
//! credential fails fast instead of prompting

use crate::domain::ports::children_from_table;
use crate::domain::{DomainError, ProcessTreeControl, Result};
use crate::infrastructure::command_runner::OneShotCommand;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SudoProcessTree {
    sudo: PathBuf,
}

impl SudoProcessTree {
    pub fn new() -> Self {
        Self {
            sudo: PathBuf::from("sudo"),
        }
    }

    /// Use another elevation helper with sudo-compatible `-n <cmd>` syntax
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            sudo: program.into(),
        }
    }

    fn command(&self) -> OneShotCommand {
        OneShotCommand::new(&self.sudo).arg("-n")
    }
}

impl Default for SudoProcessTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessTreeControl for SudoProcessTree {
    fn channel(&self) -> &'static str {
        "sudo"
    }

    async fn list_children(&self, pid: u32) -> Result<Vec<u32>> {
        let table = self
            .command()
            .args(["ps", "-A", "-o", "pid=,ppid="])
            .run()
            .await
            .map_err(|e| DomainError::Termination(e.to_string()))?;

        let children = children_from_table(&table, pid);
        debug!(pid = pid, children = ?children, "Listed children through sudo");
        Ok(children)
    }

    async fn signal(&self, pid: u32, forceful: bool) -> Result<()> {
        let signal = if forceful { "-9" } else { "-15" };
        match self
            .command()
            .args(["kill", signal, &pid.to_string()])
            .run()
            .await
        {
            Ok(_) => Ok(()),
            Err(DomainError::Operation(message)) if message.contains("No such process") => {
                debug!(pid = pid, "Process already gone");
                Ok(())
            }
            Err(e) => Err(DomainError::Termination(e.to_string())),
        }
    }
}
