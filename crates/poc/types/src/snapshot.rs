//! Whole-document snapshot persistence.
//!
//! Stores save the complete document on every mutation. The JSON file store
//! writes to `<path>.tmp`, syncs it, then renames over the target, so a crash
//! leaves either the previous or the new document on disk, never a torn one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot store lock poisoned")]
    LockPoisoned,

    #[error("snapshot write rejected: {0}")]
    Rejected(String),
}

/// Durable home of a single document.
pub trait SnapshotStore<T>: Send + Sync {
    /// Replace the persisted document.
    fn save(&self, document: &T) -> Result<(), SnapshotError>;

    /// Load the persisted document, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<T>, SnapshotError>;
}

/// JSON file snapshot with write-temp-then-rename semantics.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> SnapshotStore<T> for JsonFileSnapshot
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn save(&self, document: &T) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Option<T>, SnapshotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// In-memory snapshot store. Writes can be made to fail on demand, which is
/// how rollback paths are exercised in tests.
pub struct InMemorySnapshot<T> {
    document: Mutex<Option<T>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl<T> InMemorySnapshot<T> {
    pub fn new() -> Self {
        Self {
            document: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<T> Default for InMemorySnapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> for InMemorySnapshot<T>
where
    T: Clone + Send + Sync,
{
    fn save(&self, document: &T) -> Result<(), SnapshotError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SnapshotError::Rejected("write failure injected".to_string()));
        }
        let mut guard = self
            .document
            .lock()
            .map_err(|_| SnapshotError::LockPoisoned)?;
        *guard = Some(document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Option<T>, SnapshotError> {
        let guard = self
            .document
            .lock()
            .map_err(|_| SnapshotError::LockPoisoned)?;
        Ok(guard.clone())
    }
}
