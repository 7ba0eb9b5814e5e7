//! Sidecar lock files.
//!
//! Data files here are replaced by rename (store compaction, session saves),
//! so a lock taken on the data file itself only covers the inode that was
//! open at the time. Every reader and writer instead locks `<file>.lock`,
//! which is created once and never renamed.

use crate::Result;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A held advisory lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Block until `<data_path>.lock` is held exclusively
    pub fn exclusive(data_path: &Path) -> Result<Self> {
        let guard = Self::open(data_path)?;
        guard.file.lock_exclusive()?;
        Ok(guard)
    }

    /// Block until `<data_path>.lock` is held shared
    pub fn shared(data_path: &Path) -> Result<Self> {
        let guard = Self::open(data_path)?;
        guard.file.lock_shared()?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(data_path: &Path) -> Result<Self> {
        if let Some(parent) = data_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = lock_path(data_path);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self { file, path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release lock {:?}: {}", self.path, e);
        }
    }
}

/// `medicines.jsonl` -> `medicines.jsonl.lock`
pub fn lock_path(data_path: &Path) -> PathBuf {
    let mut name: OsString = data_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
