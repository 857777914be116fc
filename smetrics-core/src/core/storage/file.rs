use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, trace, warn};
use tempfile::NamedTempFile;

use crate::core::storage;
use crate::core::storage::{MemoryStore, MetricTables, StorageError};

/// Persists the contents of a [MemoryStore] as a JSON snapshot file.
///
/// The snapshot is first written to a temporary file in the same directory which replaces
/// the target file once completed, a reader never observes a partially written snapshot.
#[derive(Debug)]
pub struct FilePersister {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePersister {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Default::default(),
        }
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Write a snapshot of the given store to the file.
    /// Missing parent directories of the file are created.
    pub fn flush(&self, store: &MemoryStore) -> storage::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let tables = store.snapshot();
        let path = self.absolute_path();

        trace!("Serializing memory store to {}", path);
        let data = serde_json::to_string_pretty(&tables)
            .map_err(|e| StorageError::WritingFailed(path.clone(), e.to_string()))?;

        let directory = self.directory();
        fs::create_dir_all(directory).map_err(|e| {
            error!("Failed to create directory {:?}, {}", directory, e);
            StorageError::WritingFailed(path.clone(), e.to_string())
        })?;

        let file = NamedTempFile::new_in(directory)
            .and_then(|mut file| {
                file.write_all(data.as_bytes())?;
                file.as_file().sync_all()?;
                Ok(file)
            })
            .map_err(|e| {
                error!("Failed to write snapshot file {}, {}", path, e);
                StorageError::WritingFailed(path.clone(), e.to_string())
            })?;
        file.persist(&self.path).map_err(|e| {
            error!("Failed to replace snapshot file {}, {}", path, e.error);
            StorageError::WritingFailed(path.clone(), e.error.to_string())
        })?;

        debug!(
            "Snapshot file {} has been saved with {} gauges and {} counters",
            path,
            tables.gauge_store.len(),
            tables.counter_store.len()
        );
        Ok(())
    }

    /// Replace the contents of the given store with the snapshot file.
    ///
    /// It returns [StorageError::FileNotFound] when the file doesn't exist, and
    /// [StorageError::ReadingFailed] when the file isn't a valid snapshot.
    /// An empty file leaves the store untouched.
    pub fn restore(&self, store: &MemoryStore) -> storage::Result<()> {
        let path = self.absolute_path();

        trace!("Reading snapshot file {}", path);
        let data = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::FileNotFound(path.clone())
            } else {
                StorageError::ReadingFailed(path.clone(), e.to_string())
            }
        })?;

        if data.trim().is_empty() {
            warn!("Snapshot file {} is empty, nothing to restore", path);
            return Ok(());
        }

        let tables = serde_json::from_str::<MetricTables>(data.as_str()).map_err(|e| {
            error!("Snapshot file {} is invalid, {}", path, e);
            StorageError::ReadingFailed(path.clone(), e.to_string())
        })?;

        store.replace(tables);
        Ok(())
    }

    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|e| !e.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn absolute_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl Display for FilePersister {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
