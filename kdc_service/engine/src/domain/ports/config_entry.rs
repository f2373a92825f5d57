//! ConfigEntry port
//! One generated configuration file managed by a `ConfigManager`

use crate::domain::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// What an entry may look at while rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Directory the entry's file is written into
    pub directory: PathBuf,

    /// Address reserved for the service, once known
    pub address: Option<SocketAddr>,
}

impl RenderContext {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }
}

/// A managed configuration file
#[async_trait]
pub trait ConfigEntry: Send + Sync {
    /// File name relative to the entry's directory
    fn file_name(&self) -> &str;

    /// Side effects that must happen before the file is written
    /// (for example creating a database the file points at)
    async fn prepare(&self, _ctx: &RenderContext) -> Result<()> {
        Ok(())
    }

    /// Full file contents
    fn render(&self, ctx: &RenderContext) -> Result<String>;

    /// Extra files created by `prepare`, deleted on clean
    fn artifacts(&self, _ctx: &RenderContext) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Environment variables pointing a child process at this file
    fn environment(&self, _path: &Path, _ctx: &RenderContext) -> Vec<(String, String)> {
        Vec::new()
    }
}
