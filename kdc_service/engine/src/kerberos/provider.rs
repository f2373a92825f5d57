//! KDC service provider
//! The handle a build step holds: starts one KDC, adds and deletes principals
//! while it listens, and tears everything down on stop.

use crate::domain::constants::kerberos::MASTER_PRINCIPAL;
use crate::domain::{
    CleanupReport, ConfigManager, DaemonState, DomainError, PortRequest, PrincipalSpec, Result,
    ServiceDaemon,
};
use crate::infrastructure::{
    default_escalation, EnvironmentExport, KdcOptions, OneShotCommand, UdpProbe,
};
use crate::kerberos::{KdcClientConfig, KdcDaemonConfig, KdcDefinition, KerberosTools};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct KdcServiceProvider {
    tag: String,
    options: KdcOptions,
    realm: String,
    directory: PathBuf,
    tools: Option<KerberosTools>,
    daemon: Option<ServiceDaemon>,
    export: Option<EnvironmentExport>,
}

impl KdcServiceProvider {
    pub fn new(tag: impl Into<String>, options: KdcOptions) -> Result<Self> {
        options.validate()?;
        let realm = options.realm();
        let directory = options.managing_directory();

        Ok(Self {
            tag: tag.into(),
            options,
            realm,
            directory,
            tools: None,
            daemon: None,
            export: None,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn state(&self) -> DaemonState {
        self.daemon
            .as_ref()
            .map(ServiceDaemon::state)
            .unwrap_or_default()
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.daemon.as_ref().and_then(ServiceDaemon::address)
    }

    pub fn config_directory(&self) -> &Path {
        &self.directory
    }

    /// Cause of the last failed start, if any
    pub fn last_error(&self) -> Option<&DomainError> {
        self.daemon.as_ref().and_then(ServiceDaemon::last_error)
    }

    /// Variables handed back to the build tool (`config-dir-env`)
    pub fn build_environment(&self) -> HashMap<String, String> {
        self.options
            .config_dir_env
            .iter()
            .map(|key| (key.clone(), self.directory.display().to_string()))
            .collect()
    }

    /// Variables a Kerberos client needs to reach this KDC
    pub fn client_environment(&self) -> Vec<(String, String)> {
        self.daemon
            .as_ref()
            .map(ServiceDaemon::environment)
            .unwrap_or_default()
    }

    pub fn is_service_executing(&self) -> bool {
        self.state().is_listening()
    }

    /// Create the database, launch the KDC, wait for it to answer and add
    /// the initial principals
    pub async fn start_service(&mut self) -> Result<()> {
        if let Some(daemon) = &self.daemon
            && !daemon.state().is_terminal()
        {
            return Err(DomainError::DuplicateService(self.tag.clone()));
        }

        let principals = self.options.principal_specs()?;
        let mut daemon = self.build_daemon().await?;
        info!(
            tag = %self.tag,
            realm = %self.realm,
            directory = ?self.directory,
            "Starting KDC"
        );

        let started = daemon.start().await;
        self.daemon = Some(daemon);
        started?;

        if let Err(e) = self.after_start(&principals).await {
            warn!(tag = %self.tag, error = %e, "KDC setup failed after start, stopping it");
            let report = self.stop_service().await;
            if !report.is_clean() {
                warn!(tag = %self.tag, diagnostics = %report, "Cleanup after failed setup was incomplete");
            }
            return Err(e);
        }

        info!(tag = %self.tag, address = ?self.address(), "KDC listening");
        Ok(())
    }

    /// Stop the KDC and restore everything it changed
    pub async fn stop_service(&mut self) -> CleanupReport {
        if let Some(mut export) = self.export.take() {
            export.restore();
        }

        match self.daemon.as_mut() {
            Some(daemon) => daemon.stop().await,
            None => {
                debug!(tag = %self.tag, "Stop requested for a KDC that was never started");
                CleanupReport::new()
            }
        }
    }

    /// Add `name` (realm suffix ignored); password defaults to `csmake`
    pub async fn add_principal(&self, name: &str, password: Option<&str>) -> Result<()> {
        let principal = PrincipalSpec::new(name, password)?;
        let query = add_principal_query(&principal, &self.options.enctype);

        self.admin_command(&query)?
            .redact(principal.password.as_str())
            .run()
            .await?;
        info!(tag = %self.tag, principal = %principal, "Principal added");
        Ok(())
    }

    pub async fn delete_principal(&self, name: &str) -> Result<()> {
        let principal = PrincipalSpec::new(name, None)?;
        let query = delete_principal_query(&principal);

        self.admin_command(&query)?.run().await?;
        info!(tag = %self.tag, principal = %principal, "Principal deleted");
        Ok(())
    }

    async fn build_daemon(&mut self) -> Result<ServiceDaemon> {
        let tools = match &self.tools {
            Some(tools) => tools.clone(),
            None => {
                let tools = KerberosTools::locate()?;
                self.tools = Some(tools.clone());
                tools
            }
        };

        let log_level = self.options.log_level();
        debug!(tag = %self.tag, log_level = %log_level, "KDC log level");

        let mut config = ConfigManager::new(&self.directory);
        config
            .register(
                KdcDaemonConfig::new(
                    &self.realm,
                    &self.options.enctype,
                    &self.options.master_password,
                    &tools.kdb5_util,
                )
                .with_trace(self.options.trace_path()),
                None,
                false,
            )
            .await?;
        config
            .register(
                KdcClientConfig::new(&self.realm, &self.options.enctype),
                None,
                false,
            )
            .await?;

        let port_request = PortRequest::new(self.options.bind_host()?, self.options.port_spec()?);

        ServiceDaemon::builder()
            .definition(Arc::new(KdcDefinition::new(
                &tools.kdc,
                &self.realm,
                log_level.shows_output(),
            )))
            .config_manager(config)
            .port_request(port_request)
            .probe(Arc::new(UdpProbe::default()))
            .probe_policy(self.options.probe_policy()?)
            .termination(default_escalation())
            .build()
    }

    async fn after_start(&mut self, principals: &[PrincipalSpec]) -> Result<()> {
        for principal in principals {
            self.add_principal(&principal.name, Some(&principal.password))
                .await?;
        }

        if self.options.change_env_vars {
            self.export = Some(EnvironmentExport::apply(&self.client_environment())?);
        }
        Ok(())
    }

    /// `kadmin.local` against the running KDC's database
    fn admin_command(&self, query: &str) -> Result<OneShotCommand> {
        let daemon = match &self.daemon {
            Some(daemon) if daemon.state().is_listening() => daemon,
            _ => return Err(DomainError::NotRunning(self.tag.clone())),
        };
        let tools = self
            .tools
            .as_ref()
            .ok_or_else(|| DomainError::NotRunning(self.tag.clone()))?;

        Ok(OneShotCommand::new(&tools.kadmin_local)
            .args(["-r", self.realm.as_str()])
            .args(["-p", MASTER_PRINCIPAL])
            .args(["-q", query])
            .envs(daemon.environment()))
    }
}

fn add_principal_query(principal: &PrincipalSpec, enctype: &str) -> String {
    format!(
        "add_principal -pw {} -e {} {}",
        quoted(&principal.password),
        quoted(enctype),
        quoted(&principal.name)
    )
}

fn delete_principal_query(principal: &PrincipalSpec) -> String {
    format!("delete_principal -force {}", quoted(&principal.name))
}

/// One kadmin query word: wrapped in double quotes, embedded quotes doubled
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options_in(dir: &Path) -> KdcOptions {
        KdcOptions {
            realm: "test.local".to_string(),
            config_path: Some(dir.join("kdc")),
            config_dir_env: Some("KDC_DIR".to_string()),
            ..KdcOptions::default()
        }
    }

    #[test]
    fn test_new_provider_is_idle() {
        let temp = TempDir::new().unwrap();
        let provider = KdcServiceProvider::new("_", options_in(temp.path())).unwrap();

        assert_eq!(provider.tag(), "_");
        assert_eq!(provider.realm(), "TEST.LOCAL");
        assert_eq!(provider.state(), DaemonState::Idle);
        assert!(!provider.is_service_executing());
        assert!(provider.address().is_none());
        assert!(provider.client_environment().is_empty());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = KdcOptions {
            port_range: "3333-2222".to_string(),
            ..KdcOptions::default()
        };
        assert!(KdcServiceProvider::new("_", options).is_err());
    }

    #[test]
    fn test_build_environment() {
        let temp = TempDir::new().unwrap();
        let provider = KdcServiceProvider::new("_", options_in(temp.path())).unwrap();

        let env = provider.build_environment();
        assert_eq!(
            env.get("KDC_DIR").map(String::as_str),
            Some(temp.path().join("kdc").display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_principal_operations_need_running_kdc() {
        let temp = TempDir::new().unwrap();
        let provider = KdcServiceProvider::new("_", options_in(temp.path())).unwrap();

        assert!(matches!(
            provider.add_principal("alice", Some("pw1")).await,
            Err(DomainError::NotRunning(_))
        ));
        assert!(matches!(
            provider.delete_principal("alice@TEST.LOCAL").await,
            Err(DomainError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut provider = KdcServiceProvider::new("_", options_in(temp.path())).unwrap();

        let report = provider.stop_service().await;
        assert!(report.is_clean());
        assert!(!temp.path().join("kdc").exists());
    }

    #[test]
    fn test_admin_queries() {
        let alice = PrincipalSpec::new("alice@TEST.LOCAL", Some("pw1")).unwrap();
        assert_eq!(
            add_principal_query(&alice, "RC4-HMAC"),
            r#"add_principal -pw "pw1" -e "RC4-HMAC" "alice""#
        );
        assert_eq!(delete_principal_query(&alice), r#"delete_principal -force "alice""#);
    }

    #[test]
    fn test_admin_queries_keep_words_together() {
        let bob = PrincipalSpec::new("bob", Some(r#"two words -e "x" y"#)).unwrap();
        assert_eq!(
            add_principal_query(&bob, "aes256-cts"),
            r#"add_principal -pw "two words -e ""x"" y" -e "aes256-cts" "bob""#
        );

        let spaced = PrincipalSpec::new("svc admin", None).unwrap();
        assert_eq!(
            delete_principal_query(&spaced),
            r#"delete_principal -force "svc admin""#
        );
    }
}
