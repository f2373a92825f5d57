//! Domain constants shared by the lifecycle core and the KDC provider

/// Interval between readiness probe attempts (milliseconds)
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 100;

/// Readiness probe attempts before giving up (50 × 100ms ≈ 5s)
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 50;

/// Time allowed for the killed process to be reaped (seconds)
pub const DEFAULT_REAP_TIMEOUT_SEC: u64 = 5;

/// Inclusive port range used when no explicit port is requested
pub const DEFAULT_PORT_RANGE: &str = "2222-3333";

/// Host the service binds to when no interface is requested
pub const DEFAULT_INTERFACE: &str = "localhost";

/// Suffix appended to a managed file's path while its original is set aside
pub const BACKUP_SUFFIX: &str = ".kdc-service-backup";

/// Tag used when the build section does not name one
pub const DEFAULT_TAG: &str = "_";

/// Kerberos defaults
pub mod kerberos {
    pub const DEFAULT_REALM: &str = "CSMAKE.DOMAIN";
    pub const DEFAULT_PASSWORD: &str = "csmake";
    pub const DEFAULT_ENCTYPE: &str = "RC4-HMAC";
    pub const MASTER_PRINCIPAL: &str = "K/M";
    pub const CONFIG_DIR_PREFIX: &str = "kdc-service-";

    pub const CLIENT_CONFIG_FILE: &str = "krb5.conf";
    pub const DAEMON_CONFIG_FILE: &str = "kdc.conf";
    pub const DATABASE_FILE: &str = "principal";

    pub const ENV_CLIENT_CONFIG: &str = "KRB5_CONFIG";
    pub const ENV_KDC_PROFILE: &str = "KRB5_KDC_PROFILE";
    pub const ENV_TRACE: &str = "KRB5_TRACE";
    pub const DEFAULT_TRACE_PATH: &str = "/dev/stdout";

    pub const KDC_BINARY: &str = "krb5kdc";
    pub const KDB5_UTIL_BINARY: &str = "kdb5_util";
    pub const KADMIN_LOCAL_BINARY: &str = "kadmin.local";
}
