//! Configuration file lifecycle
//!
//! Every registered entry is written with backup-then-write semantics and
//! undone on clean with restore-or-delete semantics. The manager only ever
//! removes directory levels it created itself.

use crate::domain::constants::BACKUP_SUFFIX;
use crate::domain::{CleanupReport, ConfigEntry, DomainError, RenderContext, Result};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What `ensure` did for one entry, consumed by `clean`
#[derive(Debug, Default)]
struct EntryRecord {
    path: Option<PathBuf>,
    backup: Option<PathBuf>,
    written: bool,
    artifacts: Vec<PathBuf>,
}

struct ManagedEntry {
    entry: Box<dyn ConfigEntry>,
    prefix: Option<PathBuf>,
    record: EntryRecord,
}

/// Owns the generated configuration of one service instance
pub struct ConfigManager {
    directory: PathBuf,
    address: Option<SocketAddr>,
    entries: Vec<ManagedEntry>,
    /// Directory levels this manager created, shallowest first
    created_dirs: Vec<PathBuf>,
    directory_prepared: bool,
    ensured: bool,
}

impl ConfigManager {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            address: None,
            entries: Vec::new(),
            created_dirs: Vec::new(),
            directory_prepared: false,
            ensured: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Address rendered into entries written from now on
    pub fn set_address(&mut self, address: SocketAddr) {
        self.address = Some(address);
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// Whether the managing directory was created by this manager
    pub fn created_directory(&self) -> bool {
        self.created_dirs.iter().any(|dir| dir == &self.directory)
    }

    /// Add an entry. `path_prefix` is joined onto the managing directory.
    /// With `ensure_immediately` the file is written now instead of on `ensure`.
    pub async fn register(
        &mut self,
        entry: impl ConfigEntry + 'static,
        path_prefix: Option<&Path>,
        ensure_immediately: bool,
    ) -> Result<()> {
        debug!(
            file = entry.file_name(),
            prefix = ?path_prefix,
            immediate = ensure_immediately,
            "Registering config entry"
        );

        self.entries.push(ManagedEntry {
            entry: Box::new(entry),
            prefix: path_prefix.map(Path::to_path_buf),
            record: EntryRecord::default(),
        });

        if ensure_immediately {
            self.prepare_directory();
            self.write_entry(self.entries.len() - 1).await?;
        }
        Ok(())
    }

    /// Create the managing directory and write every pending entry in
    /// registration order. May be called once per instance.
    pub async fn ensure(&mut self) -> Result<()> {
        if self.ensured {
            return Err(DomainError::Configuration(format!(
                "configuration in {:?} was already ensured",
                self.directory
            )));
        }
        self.ensured = true;

        self.prepare_directory();

        for index in 0..self.entries.len() {
            if self.entries[index].record.path.is_none() {
                self.write_entry(index).await?;
            }
        }

        info!(
            directory = ?self.directory,
            entries = self.entries.len(),
            "Configuration written"
        );
        Ok(())
    }

    /// Undo `ensure`: restore backups or delete written files in reverse
    /// registration order, then remove the directory levels this manager
    /// created while they are empty. Safe to call repeatedly.
    pub fn clean(&mut self) -> CleanupReport {
        let mut report = CleanupReport::new();

        for managed in self.entries.iter_mut().rev() {
            let record = std::mem::take(&mut managed.record);
            let Some(path) = record.path else {
                continue;
            };

            for artifact in &record.artifacts {
                report.record(
                    &format!("remove {}", artifact.display()),
                    remove_file_if_exists(artifact),
                );
            }

            match record.backup {
                Some(backup) => {
                    debug!(path = ?path, backup = ?backup, "Restoring original file");
                    report.record(
                        &format!("restore {}", path.display()),
                        fs::rename(&backup, &path),
                    );
                }
                None if record.written => {
                    debug!(path = ?path, "Removing generated file");
                    report.record(
                        &format!("remove {}", path.display()),
                        remove_file_if_exists(&path),
                    );
                }
                None => {}
            }
        }

        while let Some(dir) = self.created_dirs.pop() {
            match fs::remove_dir(&dir) {
                Ok(()) => debug!(path = ?dir, "Removed config directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    // Like rmdir -p: a non-empty level keeps its parents too
                    debug!(path = ?dir, error = %e, "Config directory left in place");
                    report.push(format!("remove {}: {}", dir.display(), e));
                    self.created_dirs.clear();
                }
            }
        }

        if !report.is_clean() {
            warn!(directory = ?self.directory, diagnostics = %report, "Configuration cleanup incomplete");
        }
        report
    }

    /// Variables pointing child processes at the written files
    pub fn environment(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|managed| {
                let path = managed.record.path.as_ref()?;
                let ctx = self.context_for(managed.prefix.as_deref());
                Some(managed.entry.environment(path, &ctx))
            })
            .flatten()
            .collect()
    }

    fn context_for(&self, prefix: Option<&Path>) -> RenderContext {
        let directory = match prefix {
            Some(prefix) => self.directory.join(prefix),
            None => self.directory.clone(),
        };
        let ctx = RenderContext::new(directory);
        match self.address {
            Some(address) => ctx.with_address(address),
            None => ctx,
        }
    }

    /// A directory failure is reported but does not abort: the entries
    /// themselves will fail to write and surface the cause.
    fn prepare_directory(&mut self) {
        if self.directory_prepared {
            return;
        }
        self.directory_prepared = true;

        let before = self.created_dirs.len();
        match create_levels(&self.directory, &mut self.created_dirs) {
            Ok(()) if self.created_dirs.len() > before => {
                debug!(path = ?self.directory, "Created config directory")
            }
            Ok(()) => debug!(path = ?self.directory, "Config directory already exists"),
            Err(e) => warn!(
                path = ?self.directory,
                error = %e,
                "Failed to create config directory, the service will not have its configuration"
            ),
        }
    }

    async fn write_entry(&mut self, index: usize) -> Result<()> {
        let ctx = self.context_for(self.entries[index].prefix.as_deref());

        if ctx.directory != self.directory {
            create_levels(&ctx.directory, &mut self.created_dirs).map_err(|e| {
                DomainError::Configuration(format!(
                    "Failed to create {:?}: {}",
                    ctx.directory, e
                ))
            })?;
        }

        let managed = &mut self.entries[index];
        let path = ctx.path_of(managed.entry.file_name());
        managed.record.path = Some(path.clone());

        // 1. Set the original aside
        if fs::symlink_metadata(&path).is_ok() {
            let backup = backup_path(&path);
            if fs::symlink_metadata(&backup).is_ok() {
                return Err(DomainError::Configuration(format!(
                    "stale backup {:?} is in the way, refusing to overwrite it",
                    backup
                )));
            }
            fs::rename(&path, &backup).map_err(|e| {
                DomainError::Configuration(format!("Failed to back up {:?}: {}", path, e))
            })?;
            debug!(path = ?path, backup = ?backup, "Backed up existing file");
            managed.record.backup = Some(backup);
        }

        // 2. Entry side effects; only artifacts absent beforehand are ours to remove
        managed.record.artifacts = managed
            .entry
            .artifacts(&ctx)
            .into_iter()
            .filter(|artifact| {
                let existed = fs::symlink_metadata(artifact).is_ok();
                if existed {
                    debug!(path = ?artifact, "Artifact already present, leaving it alone");
                }
                !existed
            })
            .collect();
        managed.entry.prepare(&ctx).await?;

        // 3. Render and write
        let contents = managed.entry.render(&ctx)?;
        managed.record.written = true;
        fs::write(&path, contents).map_err(|e| {
            DomainError::Configuration(format!("Failed to write {:?}: {}", path, e))
        })?;

        debug!(path = ?path, "Wrote config file");
        Ok(())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("directory", &self.directory)
            .field("address", &self.address)
            .field("entries", &self.entries.len())
            .field("created_dirs", &self.created_dirs)
            .field("ensured", &self.ensured)
            .finish()
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// `mkdir -p` that records every level it actually created
fn create_levels(dir: &Path, created: &mut Vec<PathBuf>) -> io::Result<()> {
    let missing: Vec<&Path> = dir.ancestors().take_while(|p| !p.exists()).collect();

    for level in missing.into_iter().rev() {
        match fs::create_dir(level) {
            Ok(()) => created.push(level.to_path_buf()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
