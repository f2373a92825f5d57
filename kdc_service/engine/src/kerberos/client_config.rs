//! Client-side krb5.conf pointing at the ephemeral KDC

use crate::domain::constants::kerberos::{CLIENT_CONFIG_FILE, ENV_CLIENT_CONFIG};
use crate::domain::{ConfigEntry, DomainError, RenderContext, Result};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct KdcClientConfig {
    realm: String,
    enctype: String,
}

impl KdcClientConfig {
    pub fn new(realm: impl Into<String>, enctype: impl Into<String>) -> Self {
        Self {
            realm: realm.into().to_uppercase(),
            enctype: enctype.into(),
        }
    }
}

#[async_trait]
impl ConfigEntry for KdcClientConfig {
    fn file_name(&self) -> &str {
        CLIENT_CONFIG_FILE
    }

    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let address = ctx.address.ok_or_else(|| {
            DomainError::Configuration("client config needs the KDC address".to_string())
        })?;
        let domain = self.realm.to_lowercase();

        Ok(format!(
            "[libdefaults]
    default_realm = {realm}
    rdns = false
    permitted_enctypes = {enctype}

[realms]
    {realm} = {{
        kdc = {address}
        default_domain = {domain}
    }}

[domain_realm]
    {domain} = {realm}
",
            realm = self.realm,
            enctype = self.enctype,
            address = address,
            domain = domain,
        ))
    }

    fn environment(&self, path: &Path, _ctx: &RenderContext) -> Vec<(String, String)> {
        vec![(ENV_CLIENT_CONFIG.to_string(), path.display().to_string())]
    }
}
