//! Termination escalation
//!
//! Kill the children of the tracked process and then the process itself
//! through the primary channel. If any step fails, repeat both steps through
//! the fallback channel. Never raises: the outcome is reported and logged.

use crate::domain::{ProcessTreeControl, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which channel, if any, managed to kill the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    Primary,
    Fallback,
    Failed(String),
}

impl TerminationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TerminationOutcome::Failed(_))
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationOutcome::Primary => write!(f, "terminated"),
            TerminationOutcome::Fallback => write!(f, "terminated through fallback"),
            TerminationOutcome::Failed(reason) => write!(f, "termination failed: {}", reason),
        }
    }
}

#[derive(Clone)]
pub struct TerminationEscalation {
    primary: Arc<dyn ProcessTreeControl>,
    fallback: Option<Arc<dyn ProcessTreeControl>>,
}

impl TerminationEscalation {
    pub fn new(
        primary: Arc<dyn ProcessTreeControl>,
        fallback: Option<Arc<dyn ProcessTreeControl>>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub async fn terminate(&self, pid: u32) -> TerminationOutcome {
        let primary_error = match kill_tree(self.primary.as_ref(), pid).await {
            Ok(()) => {
                info!(pid = pid, channel = self.primary.channel(), "Process tree killed");
                return TerminationOutcome::Primary;
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            error!(
                pid = pid,
                channel = self.primary.channel(),
                error = %primary_error,
                "Could not terminate process tree"
            );
            return TerminationOutcome::Failed(primary_error.to_string());
        };

        warn!(
            pid = pid,
            channel = self.primary.channel(),
            fallback = fallback.channel(),
            error = %primary_error,
            "Could not stop process tree through the standard channel, escalating"
        );

        match kill_tree(fallback.as_ref(), pid).await {
            Ok(()) => {
                info!(pid = pid, channel = fallback.channel(), "Process tree killed");
                TerminationOutcome::Fallback
            }
            Err(e) => {
                error!(
                    pid = pid,
                    channel = fallback.channel(),
                    error = %e,
                    "Could not terminate process tree"
                );
                TerminationOutcome::Failed(format!(
                    "{}: {}; {}: {}",
                    self.primary.channel(),
                    primary_error,
                    fallback.channel(),
                    e
                ))
            }
        }
    }
}

impl fmt::Debug for TerminationEscalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationEscalation")
            .field("primary", &self.primary.channel())
            .field("fallback", &self.fallback.as_ref().map(|c| c.channel()))
            .finish()
    }
}

async fn kill_tree(control: &dyn ProcessTreeControl, pid: u32) -> Result<()> {
    let children = control.list_children(pid).await?;
    debug!(pid = pid, channel = control.channel(), children = ?children, "Killing process tree");

    for child in children {
        control.signal(child, true).await?;
    }
    control.signal(pid, true).await
}
