//! MIT Kerberos server tools
//! Resolved once per provider; server binaries often live in sbin, which
//! non-root users rarely have on PATH

use crate::domain::constants::kerberos::{KADMIN_LOCAL_BINARY, KDB5_UTIL_BINARY, KDC_BINARY};
use crate::domain::{DomainError, Result};
use std::path::PathBuf;
use tracing::debug;

/// Searched after PATH
const SBIN_DIRS: &str = "/usr/sbin:/usr/local/sbin:/sbin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosTools {
    pub kdc: PathBuf,
    pub kdb5_util: PathBuf,
    pub kadmin_local: PathBuf,
}

impl KerberosTools {
    pub fn locate() -> Result<Self> {
        Ok(Self {
            kdc: find(KDC_BINARY)?,
            kdb5_util: find(KDB5_UTIL_BINARY)?,
            kadmin_local: find(KADMIN_LOCAL_BINARY)?,
        })
    }

    /// True when every tool can be found
    pub fn available() -> bool {
        Self::locate().is_ok()
    }
}

fn find(name: &str) -> Result<PathBuf> {
    let path = which::which(name)
        .or_else(|_| which::which_in(name, Some(SBIN_DIRS), "/"))
        .map_err(|e| {
            DomainError::Configuration(format!(
                "{} not found ({}); install the MIT Kerberos KDC tools",
                name, e
            ))
        })?;
    debug!(tool = name, path = ?path, "Located Kerberos tool");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_common_binary() {
        assert!(find("sh").is_ok());
    }

    #[test]
    fn test_missing_tool_is_configuration_error() {
        assert!(matches!(
            find("definitely-not-a-kerberos-tool"),
            Err(DomainError::Configuration(_))
        ));
    }
}
