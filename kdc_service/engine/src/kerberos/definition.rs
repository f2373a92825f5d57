//! How to launch krb5kdc on a reserved address

use crate::domain::{LaunchSpec, Result, ServiceDefinition};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct KdcDefinition {
    kdc: PathBuf,
    realm: String,
    show_output: bool,
}

impl KdcDefinition {
    pub fn new(kdc: impl Into<PathBuf>, realm: impl Into<String>, show_output: bool) -> Self {
        Self {
            kdc: kdc.into(),
            realm: realm.into(),
            show_output,
        }
    }
}

impl ServiceDefinition for KdcDefinition {
    fn name(&self) -> &str {
        "krb5kdc"
    }

    /// `-n` keeps the KDC in the foreground so its pid is the one we track
    fn launch_spec(&self, address: SocketAddr) -> Result<LaunchSpec> {
        let mut spec = LaunchSpec::new(&self.kdc)
            .arg("-n")
            .args(["-p", &address.port().to_string()])
            .args(["-r", self.realm.as_str()]);

        let output = if self.show_output { "inherit" } else { "null" };
        spec.stdout = Some(output.to_string());
        spec.stderr = Some("inherit".to_string());
        Ok(spec)
    }
}
