//! CleanupReport value object
//! Non-fatal diagnostics accumulated while tearing a service down

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    diagnostics: Vec<String>,
}

impl CleanupReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: impl Into<String>) {
        self.diagnostics.push(diagnostic.into());
    }

    /// Record the error of a teardown step, if any
    pub fn record<E: fmt::Display>(&mut self, step: &str, result: std::result::Result<(), E>) {
        if let Err(e) = result {
            self.push(format!("{}: {}", step, e));
        }
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(f, "clean")
        } else {
            write!(f, "{}", self.diagnostics.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut report = CleanupReport::new();
        assert!(report.is_clean());

        report.record::<String>("restore", Ok(()));
        assert!(report.is_clean());

        report.record("remove dir", Err("directory not empty"));
        let mut other = CleanupReport::new();
        other.push("kill failed");
        report.merge(other);

        assert_eq!(
            report.diagnostics(),
            &["remove dir: directory not empty", "kill failed"]
        );
        assert_eq!(
            report.to_string(),
            "remove dir: directory not empty; kill failed"
        );
    }
}
