//! ProcessTreeControl port
//! Capability to enumerate and signal the processes of a service

use crate::domain::Result;
use async_trait::async_trait;

/// Port for finding and killing the children of a tracked process
#[async_trait]
pub trait ProcessTreeControl: Send + Sync {
    /// Name of the channel ("direct", "sudo", ...) for logs
    fn channel(&self) -> &'static str;

    /// Direct children of `pid`
    async fn list_children(&self, pid: u32) -> Result<Vec<u32>>;

    /// Deliver SIGKILL (`forceful`) or SIGTERM to `pid`.
    /// A process that is already gone is not an error.
    async fn signal(&self, pid: u32, forceful: bool) -> Result<()>;
}

/// Parse `pid ppid` lines (as printed by `ps -A -o pid=,ppid=`) and return the
/// children of `parent`
pub fn children_from_table(table: &str, parent: u32) -> Vec<u32> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse::<u32>().ok()?;
            let ppid = fields.next()?.parse::<u32>().ok()?;
            (ppid == parent).then_some(pid)
        })
        .collect()
}
