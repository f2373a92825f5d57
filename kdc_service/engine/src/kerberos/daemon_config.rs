//! KDC-side kdc.conf plus the principal database it points at

use crate::domain::constants::kerberos::{
    DAEMON_CONFIG_FILE, DATABASE_FILE, ENV_KDC_PROFILE, ENV_TRACE,
};
use crate::domain::{ConfigEntry, DomainError, RenderContext, Result};
use crate::infrastructure::OneShotCommand;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files `kdb5_util create -s` leaves next to the database
const DATABASE_SUFFIXES: &[&str] = &["", ".ok", ".kadm5", ".kadm5.lock", ".stash"];

#[derive(Debug, Clone)]
pub struct KdcDaemonConfig {
    realm: String,
    enctype: String,
    master_password: String,
    kdb5_util: PathBuf,
    trace: Option<PathBuf>,
}

impl KdcDaemonConfig {
    pub fn new(
        realm: impl Into<String>,
        enctype: impl Into<String>,
        master_password: impl Into<String>,
        kdb5_util: impl Into<PathBuf>,
    ) -> Self {
        Self {
            realm: realm.into().to_uppercase(),
            enctype: enctype.into(),
            master_password: master_password.into(),
            kdb5_util: kdb5_util.into(),
            trace: None,
        }
    }

    /// Send the Kerberos library trace of the KDC to `path`
    pub fn with_trace(mut self, path: Option<PathBuf>) -> Self {
        self.trace = path;
        self
    }

    fn database(ctx: &RenderContext) -> PathBuf {
        ctx.path_of(DATABASE_FILE)
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl ConfigEntry for KdcDaemonConfig {
    fn file_name(&self) -> &str {
        DAEMON_CONFIG_FILE
    }

    /// Create a fresh principal database with a stash file
    async fn prepare(&self, ctx: &RenderContext) -> Result<()> {
        let database = Self::database(ctx);
        let stash = Self::with_suffix(&database, ".stash");

        OneShotCommand::new(&self.kdb5_util)
            .arg("-sf")
            .arg(stash.display().to_string())
            .arg("-d")
            .arg(database.display().to_string())
            .args(["-k", self.enctype.as_str()])
            .args(["-P", self.master_password.as_str()])
            .args(["-r", self.realm.as_str()])
            .args(["create", "-s"])
            .redact(self.master_password.as_str())
            .run()
            .await
            .map_err(|e| {
                DomainError::Configuration(format!("Failed to create principal database: {}", e))
            })?;

        info!(database = ?database, realm = %self.realm, "Principal database created");
        Ok(())
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let database = Self::database(ctx);
        Ok(format!(
            "[realms]
    {realm} = {{
        database_name = {database}
        key_stash_file = {stash}
        supported_enctypes = {enctype}
    }}

[logging]
    kdc = CONSOLE
",
            realm = self.realm,
            database = database.display(),
            stash = Self::with_suffix(&database, ".stash").display(),
            enctype = self.enctype,
        ))
    }

    fn artifacts(&self, ctx: &RenderContext) -> Vec<PathBuf> {
        let database = Self::database(ctx);
        DATABASE_SUFFIXES
            .iter()
            .map(|suffix| Self::with_suffix(&database, suffix))
            .collect()
    }

    fn environment(&self, path: &Path, _ctx: &RenderContext) -> Vec<(String, String)> {
        let mut env = vec![(ENV_KDC_PROFILE.to_string(), path.display().to_string())];
        if let Some(trace) = &self.trace {
            env.push((ENV_TRACE.to_string(), trace.display().to_string()));
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KdcDaemonConfig {
        KdcDaemonConfig::new("test.local", "RC4-HMAC", "csmake", "/usr/sbin/kdb5_util")
    }

    #[test]
    fn test_render_points_at_database() {
        let ctx = RenderContext::new("/tmp/kdc");
        let text = config().render(&ctx).unwrap();

        assert!(text.contains("TEST.LOCAL = {"));
        assert!(text.contains("database_name = /tmp/kdc/principal\n"));
        assert!(text.contains("key_stash_file = /tmp/kdc/principal.stash"));
        assert!(text.contains("supported_enctypes = RC4-HMAC"));
        assert!(text.contains("kdc = CONSOLE"));
    }

    #[test]
    fn test_artifacts() {
        let ctx = RenderContext::new("/tmp/kdc");
        let artifacts = config().artifacts(&ctx);
        assert_eq!(artifacts.len(), 5);
        assert!(artifacts.contains(&PathBuf::from("/tmp/kdc/principal")));
        assert!(artifacts.contains(&PathBuf::from("/tmp/kdc/principal.kadm5.lock")));
    }

    #[test]
    fn test_environment_with_and_without_trace() {
        let ctx = RenderContext::new("/tmp/kdc");
        let path = Path::new("/tmp/kdc/kdc.conf");

        let env = config().environment(path, &ctx);
        assert_eq!(env, vec![("KRB5_KDC_PROFILE".to_string(), "/tmp/kdc/kdc.conf".to_string())]);

        let env = config()
            .with_trace(Some(PathBuf::from("/dev/stdout")))
            .environment(path, &ctx);
        assert_eq!(env[1], ("KRB5_TRACE".to_string(), "/dev/stdout".to_string()));
    }

    #[tokio::test]
    async fn test_failed_database_creation_is_configuration_error() {
        let ctx = RenderContext::new("/tmp/kdc");
        let config = KdcDaemonConfig::new("X", "RC4-HMAC", "pw", "/bin/false");
        assert!(matches!(
            config.prepare(&ctx).await,
            Err(DomainError::Configuration(_))
        ));
    }
}
