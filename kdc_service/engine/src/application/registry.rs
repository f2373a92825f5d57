//! Provider Registry
//! Composition root keyed by build tag: at most one KDC provider per tag

use crate::domain::{CleanupReport, DomainError, Result};
use crate::infrastructure::KdcOptions;
use crate::kerberos::KdcServiceProvider;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub type SharedProvider = Arc<Mutex<KdcServiceProvider>>;

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, SharedProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new provider under `tag`. Fails if the tag is taken; an
    /// instance must be disposed before the tag can be reused.
    pub async fn create(&self, tag: &str, options: KdcOptions) -> Result<SharedProvider> {
        let mut providers = self.providers.write().await;
        if providers.contains_key(tag) {
            return Err(DomainError::DuplicateService(tag.to_string()));
        }

        let provider = Arc::new(Mutex::new(KdcServiceProvider::new(tag, options)?));
        providers.insert(tag.to_string(), provider.clone());
        debug!(tag = %tag, total_providers = providers.len(), "Provider registered");
        Ok(provider)
    }

    pub async fn get(&self, tag: &str) -> Result<SharedProvider> {
        self.providers
            .read()
            .await
            .get(tag)
            .cloned()
            .ok_or_else(|| DomainError::ServiceNotFound(tag.to_string()))
    }

    pub async fn contains(&self, tag: &str) -> bool {
        self.providers.read().await.contains_key(tag)
    }

    pub async fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.providers.read().await.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Remove the provider for `tag` and stop its KDC
    pub async fn dispose(&self, tag: &str) -> Result<CleanupReport> {
        let provider = self
            .providers
            .write()
            .await
            .remove(tag)
            .ok_or_else(|| DomainError::ServiceNotFound(tag.to_string()))?;

        let report = provider.lock().await.stop_service().await;
        info!(tag = %tag, diagnostics = %report, "Provider disposed");
        Ok(report)
    }

    /// Dispose every provider, merging their cleanup diagnostics
    pub async fn dispose_all(&self) -> CleanupReport {
        let drained: Vec<(String, SharedProvider)> =
            self.providers.write().await.drain().collect();

        let mut report = CleanupReport::new();
        for (tag, provider) in drained {
            debug!(tag = %tag, "Disposing provider");
            report.merge(provider.lock().await.stop_service().await);
        }
        report
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
