//! Parent-process environment export
//!
//! Child processes always receive their variables through their own command
//! environment. Exporting into this process is opt-in: every export goes
//! through one global lock, a variable can be owned by only one export at a
//! time, and prior values come back when the export is restored or dropped.

use crate::domain::{DomainError, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::ffi::OsString;
use std::sync::Mutex;
use tracing::{debug, info};

/// Variables currently owned by a live export
static EXPORTED: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

#[derive(Debug)]
pub struct EnvironmentExport {
    previous: Vec<(String, Option<OsString>)>,
    restored: bool,
}

impl EnvironmentExport {
    /// Export `vars` into this process. Fails without touching anything if
    /// another live export already owns one of them.
    pub fn apply(vars: &[(String, String)]) -> Result<Self> {
        let mut owned = EXPORTED.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((key, _)) = vars.iter().find(|(key, _)| owned.contains(key)) {
            return Err(DomainError::Configuration(format!(
                "{} is already exported by another service instance",
                key
            )));
        }

        let mut previous = Vec::with_capacity(vars.len());
        for (key, value) in vars {
            previous.push((key.clone(), std::env::var_os(key)));
            // SAFETY: all writes to these variables are serialised by EXPORTED,
            // and std's own environment accessors take the process env lock.
            unsafe { std::env::set_var(key, value) };
            owned.insert(key.clone());
            debug!(key = %key, value = %value, "Exported environment variable");
        }

        info!(count = vars.len(), "Environment exported to the current process");
        Ok(Self {
            previous,
            restored: false,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.previous.iter().map(|(key, _)| key.as_str())
    }

    /// Put back the values seen before `apply`
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;

        let mut owned = EXPORTED.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in self.previous.iter().rev() {
            // SAFETY: see `apply`
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
            owned.remove(key);
        }
        debug!(count = self.previous.len(), "Environment restored");
    }
}

impl Drop for EnvironmentExport {
    fn drop(&mut self) {
        self.restore();
    }
}
