//! ServiceDefinition port
//! Describes how to launch one concrete service on a reserved address

use crate::domain::Result;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Everything needed to spawn the service process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added on top of the environment contributed by config entries
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    pub stdout: Option<String>, // File path, "inherit", or "null"
    pub stderr: Option<String>, // File path, "inherit", or "null"
}

impl LaunchSpec {
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command line for logs
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub trait ServiceDefinition: Send + Sync {
    fn name(&self) -> &str;

    /// Command line for the service bound to `address`
    fn launch_spec(&self, address: SocketAddr) -> Result<LaunchSpec>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let spec = LaunchSpec::new("/usr/sbin/krb5kdc")
            .arg("-n")
            .args(["-p", "2222"])
            .env("KRB5_TRACE", "/dev/stdout");
        assert_eq!(spec.display_command(), "/usr/sbin/krb5kdc -n -p 2222");
        assert_eq!(spec.env.len(), 1);
        assert!(spec.stdout.is_none());
    }
}
