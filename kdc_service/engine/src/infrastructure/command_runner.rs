//! One-shot external commands
//! Runs a tool to completion and returns its stdout

use crate::domain::{DomainError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct OneShotCommand {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    secret: Option<String>,
}

impl OneShotCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Value masked whenever the command line is logged
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn display(&self) -> String {
        let line = std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        match &self.secret {
            Some(secret) if !secret.is_empty() => line.replace(secret.as_str(), "****"),
            _ => line,
        }
    }

    /// Run to completion. A spawn failure or non-zero exit is an
    /// `Operation` error carrying the tail of stderr.
    pub async fn run(&self) -> Result<String> {
        debug!(command = %self.display(), "Running command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DomainError::Operation(format!("Failed to execute '{}': {}", self.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            warn!(
                command = %self.display(),
                status = %output.status,
                stderr = %tail,
                "Command failed"
            );
            return Err(DomainError::Operation(format!(
                "'{}' exited with {}: {}",
                self.display(),
                output.status,
                tail
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_returns_stdout() {
        let out = OneShotCommand::new("/bin/sh")
            .args(["-c", "echo \"$GREETING\""])
            .envs([("GREETING".to_string(), "hello".to_string())])
            .run()
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let err = OneShotCommand::new("/bin/sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run()
            .await
            .unwrap_err();
        match err {
            DomainError::Operation(message) => assert!(message.contains("boom"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = OneShotCommand::new("/nonexistent/tool").run().await;
        assert!(matches!(result, Err(DomainError::Operation(_))));
    }

    #[test]
    fn test_display_redacts_secret() {
        let command = OneShotCommand::new("kadmin.local")
            .args(["-q", "add_principal -pw hunter2 alice"])
            .redact("hunter2");
        assert_eq!(command.display(), "kadmin.local -q add_principal -pw **** alice");
    }
}
