//! MIT Kerberos KDC on top of the lifecycle core

pub mod client_config;
pub mod daemon_config;
pub mod definition;
pub mod provider;
pub mod tools;

pub use client_config::KdcClientConfig;
pub use daemon_config::KdcDaemonConfig;
pub use definition::KdcDefinition;
pub use provider::KdcServiceProvider;
pub use tools::KerberosTools;
