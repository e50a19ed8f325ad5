//! File-backed view over the shared-memory region.
//!
//! Each entry is published as `<region_dir>/<id>` by whatever exports the
//! bootloader's shared memory on this platform (a debugfs node, a copy made by
//! an init script, or a fixture in tests).

use diaglock_core::config::DiagLockConfig;
use diaglock_core::error::{DiagLockError, DiagLockResult};
use diaglock_provider::{SharedMemory, SmemId};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Shared-memory reader rooted at a directory.
#[derive(Debug, Clone)]
pub struct SystemSharedMemory {
    root: PathBuf,
}

impl SystemSharedMemory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &DiagLockConfig) -> Self {
        Self::new(config.region_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, id: SmemId) -> PathBuf {
        self.root.join(id.to_string())
    }
}

impl SharedMemory for SystemSharedMemory {
    type Error = DiagLockError;

    fn entry(&self, id: SmemId) -> DiagLockResult<Option<Vec<u8>>> {
        let path = self.entry_path(id);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("read smem entry {id} ({} bytes) from {}", bytes.len(), path.display());
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DiagLockError::Provider(format!(
                "failed to read smem entry {id} at {}: {err}",
                path.display()
            ))),
        }
    }
}
