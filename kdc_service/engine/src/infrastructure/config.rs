//! KDC service options
//!
//! Loaded from a YAML file or from a build-tool section (flat string map where
//! booleans are `True`/`False` and lists are comma or newline separated).

use crate::domain::constants::kerberos::{
    CONFIG_DIR_PREFIX, DEFAULT_ENCTYPE, DEFAULT_PASSWORD, DEFAULT_REALM,
};
use crate::domain::constants::{
    DEFAULT_INTERFACE, DEFAULT_PORT_RANGE, DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_INTERVAL_MS,
};
use crate::domain::{DomainError, KdcLogLevel, PortSpec, PrincipalSpec, ProbePolicy, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a default options file for the CLI
pub const OPTIONS_PATH_ENV: &str = "KDC_SERVICE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct KdcOptions {
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Exact port; takes precedence over `port-range`
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_port_range")]
    pub port_range: String,

    /// First entry is the bind host
    #[serde(default = "default_interfaces")]
    pub interfaces: Vec<String>,

    #[serde(default)]
    pub chroot: Option<PathBuf>,

    /// Managing directory; a fresh directory under the temp dir when unset
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Also export the client variables into this process
    #[serde(default)]
    pub change_env_vars: bool,

    /// Build-environment variable that receives the managing directory
    #[serde(default)]
    pub config_dir_env: Option<String>,

    /// `name` or `name:password`
    #[serde(default)]
    pub principals: Vec<String>,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub dev_output: bool,

    /// Trace destination when tracing is enabled
    #[serde(default)]
    pub log: Option<PathBuf>,

    #[serde(default = "default_enctype")]
    pub enctype: String,

    #[serde(default = "default_master_password")]
    pub master_password: String,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
}

fn default_realm() -> String {
    DEFAULT_REALM.to_string()
}

fn default_port_range() -> String {
    DEFAULT_PORT_RANGE.to_string()
}

fn default_interfaces() -> Vec<String> {
    vec![DEFAULT_INTERFACE.to_string()]
}

fn default_enctype() -> String {
    DEFAULT_ENCTYPE.to_string()
}

fn default_master_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

fn default_probe_attempts() -> u32 {
    DEFAULT_PROBE_ATTEMPTS
}

impl Default for KdcOptions {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            port: None,
            port_range: default_port_range(),
            interfaces: default_interfaces(),
            chroot: None,
            config_path: None,
            change_env_vars: false,
            config_dir_env: None,
            principals: Vec::new(),
            quiet: false,
            verbose: false,
            debug: false,
            dev_output: false,
            log: None,
            enctype: default_enctype(),
            master_password: default_master_password(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_attempts: default_probe_attempts(),
        }
    }
}

impl KdcOptions {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(contents)
            .map_err(|e| DomainError::InvalidConfiguration(format!("Invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DomainError::InvalidConfiguration(format!(
                "Failed to read options file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Build from a flat key/value section. Unknown keys are rejected.
    pub fn from_section(section: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        for (key, value) in section {
            let value = value.trim();
            match key.as_str() {
                "realm" => options.realm = value.to_string(),
                "port" => options.port = Some(parse_number(key, value)?),
                "port-range" => options.port_range = value.to_string(),
                "interfaces" => options.interfaces = parse_list(value),
                "chroot" => options.chroot = Some(PathBuf::from(value)),
                "config-path" => options.config_path = Some(PathBuf::from(value)),
                "change-env-vars" => options.change_env_vars = parse_flag(key, value)?,
                "config-dir-env" => options.config_dir_env = Some(value.to_string()),
                "principals" => options.principals = parse_list(value),
                "quiet" => options.quiet = parse_flag(key, value)?,
                "verbose" => options.verbose = parse_flag(key, value)?,
                "debug" => options.debug = parse_flag(key, value)?,
                "dev-output" => options.dev_output = parse_flag(key, value)?,
                "log" => options.log = Some(PathBuf::from(value)),
                "enctype" => options.enctype = value.to_string(),
                "master-password" => options.master_password = value.to_string(),
                "probe-interval-ms" => options.probe_interval_ms = parse_number(key, value)?,
                "probe-attempts" => options.probe_attempts = parse_number(key, value)?,
                _ => {
                    return Err(DomainError::InvalidConfiguration(format!(
                        "unknown option '{}'",
                        key
                    )));
                }
            }
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.realm.trim().is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "realm must not be empty".to_string(),
            ));
        }
        if self.interfaces.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "at least one interface is required".to_string(),
            ));
        }
        self.port_spec()?;
        self.probe_policy()?;
        self.principal_specs()?;
        Ok(())
    }

    /// Realms are conventionally upper case
    pub fn realm(&self) -> String {
        self.realm.trim().to_uppercase()
    }

    pub fn port_spec(&self) -> Result<PortSpec> {
        match self.port {
            Some(0) => Err(DomainError::InvalidConfiguration(
                "port must be non-zero".to_string(),
            )),
            Some(port) => Ok(PortSpec::Exact(port)),
            None => self.port_range.parse(),
        }
    }

    /// Resolve the first interface to an address
    pub fn bind_host(&self) -> Result<IpAddr> {
        let interface = self.interfaces.first().map(String::as_str).unwrap_or(DEFAULT_INTERFACE);
        if let Ok(ip) = interface.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addresses: Vec<_> = (interface, 0u16)
            .to_socket_addrs()
            .map_err(|e| {
                DomainError::InvalidConfiguration(format!(
                    "cannot resolve interface '{}': {}",
                    interface, e
                ))
            })?
            .collect();
        // Prefer IPv4: the generated client config writes host:port
        addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addresses.first())
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                DomainError::InvalidConfiguration(format!(
                    "interface '{}' resolves to no address",
                    interface
                ))
            })
    }

    pub fn probe_policy(&self) -> Result<ProbePolicy> {
        ProbePolicy::new(
            Duration::from_millis(self.probe_interval_ms),
            self.probe_attempts,
        )
    }

    pub fn log_level(&self) -> KdcLogLevel {
        KdcLogLevel::from_flags(self.quiet, self.verbose, self.debug, self.dev_output)
    }

    pub fn principal_specs(&self) -> Result<Vec<PrincipalSpec>> {
        self.principals
            .iter()
            .map(|principal| principal.parse::<PrincipalSpec>())
            .collect()
    }

    /// Where the Kerberos trace goes, when the log level asks for one
    pub fn trace_path(&self) -> Option<PathBuf> {
        use crate::domain::constants::kerberos::DEFAULT_TRACE_PATH;

        self.log_level().enables_trace().then(|| {
            self.log
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACE_PATH))
        })
    }

    /// Managing directory: `config-path` (or a fresh temp path) re-rooted
    /// under `chroot` when one is set
    pub fn managing_directory(&self) -> PathBuf {
        let config_path = self.config_path.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("{}{}", CONFIG_DIR_PREFIX, uuid::Uuid::new_v4()))
        });

        match &self.chroot {
            Some(chroot) => {
                let relative: PathBuf = config_path
                    .components()
                    .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                    .collect();
                chroot.join(relative)
            }
            None => config_path,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        _ => Err(DomainError::InvalidConfiguration(format!(
            "option '{}' expects True or False, got '{}'",
            key, value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        DomainError::InvalidConfiguration(format!(
            "option '{}' expects a number, got '{}'",
            key, value
        ))
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
