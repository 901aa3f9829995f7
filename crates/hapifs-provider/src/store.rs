//! Durable backing for the path cache.
//!
//! The in-memory cache is authoritative while the process runs. The store
//! only exists so a restarted process can rehydrate the tree it had already
//! discovered, so writes are whole-snapshot replaces and failures are
//! reported to the caller to log rather than to act on.
//!
//! Inside a Tokio runtime [`JsonFileStore`] writes the file on the blocking
//! pool, coalescing every mutation made while a write is pending into one
//! flush. Call [`CacheStore::sync`] to wait for the file to catch up.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::item::Entry;

/// Errors from durable stores (cache snapshot and credentials).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable side-store keyed by virtual path.
pub trait CacheStore: Send + Sync {
    /// Every stored entry.
    fn load(&self) -> Result<Vec<(String, Entry)>, StoreError>;

    fn put(&self, path: &str, entry: &Entry) -> Result<(), StoreError>;

    /// Store a batch, such as one directory listing.
    fn put_many(&self, entries: &[(String, Entry)]) -> Result<(), StoreError> {
        entries.iter().try_for_each(|(path, entry)| self.put(path, entry))
    }

    fn remove(&self, paths: &[String]) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Block until every earlier mutation is durable.
    fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Vec<(String, Entry)>, StoreError> {
        Ok(Vec::new())
    }

    fn put(&self, _path: &str, _entry: &Entry) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove(&self, _paths: &[String]) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// JSON snapshot on disk, replaced atomically after mutations.
#[derive(Debug)]
pub struct JsonFileStore {
    file: Arc<SnapshotFile>,
}

#[derive(Debug)]
struct SnapshotFile {
    path: PathBuf,
    snapshot: Mutex<BTreeMap<String, Entry>>,
    /// Held across serialize and write so flushes land in order.
    writer: Mutex<()>,
    dirty: AtomicBool,
    flush_scheduled: AtomicBool,
    flushes: AtomicUsize,
}

impl JsonFileStore {
    /// Open (or lazily create) a snapshot file.
    ///
    /// A missing file is an empty snapshot; an unreadable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StoreError::json(&path, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        debug!(path = %path.display(), entries = snapshot.len(), "opened cache snapshot");
        Ok(Self {
            file: Arc::new(SnapshotFile {
                path,
                snapshot: Mutex::new(snapshot),
                writer: Mutex::new(()),
                dirty: AtomicBool::new(false),
                flush_scheduled: AtomicBool::new(false),
                flushes: AtomicUsize::new(0),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// How many times the file has been written.
    pub fn flush_count(&self) -> usize {
        self.file.flushes.load(Ordering::Acquire)
    }

    /// Apply `f` to the snapshot and schedule a write if it reports a change.
    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Entry>) -> bool,
    ) -> Result<(), StoreError> {
        let changed = f(&mut self.file.snapshot.lock());
        if !changed {
            return Ok(());
        }
        self.file.dirty.store(true, Ordering::Release);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return self.file.flush_if_dirty();
        };
        if !self.file.flush_scheduled.swap(true, Ordering::AcqRel) {
            let file = Arc::clone(&self.file);
            runtime.spawn_blocking(move || {
                file.flush_scheduled.store(false, Ordering::Release);
                if let Err(e) = file.flush_if_dirty() {
                    warn!(error = %e, "failed to write cache snapshot");
                }
            });
        }
        Ok(())
    }
}

impl SnapshotFile {
    fn flush_if_dirty(&self) -> Result<(), StoreError> {
        let _writer = self.writer.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.write();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn write(&self) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(&*self.snapshot.lock())
            .map_err(|e| StoreError::json(&self.path, e))?;
        write_atomically(&self.path, &contents)?;
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Replace `path` with `contents` through a temp file in the same directory.
///
/// The temp file is created owner-only, so the result is too.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<Vec<(String, Entry)>, StoreError> {
        Ok(self
            .file
            .snapshot
            .lock()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect())
    }

    fn put(&self, path: &str, entry: &Entry) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            snapshot.insert(path.to_string(), entry.clone());
            true
        })
    }

    fn put_many(&self, entries: &[(String, Entry)]) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            for (path, entry) in entries {
                snapshot.insert(path.clone(), entry.clone());
            }
            !entries.is_empty()
        })
    }

    fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            let mut changed = false;
            for path in paths {
                changed |= snapshot.remove(path).is_some();
            }
            changed
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            let changed = !snapshot.is_empty();
            snapshot.clear();
            changed
        })
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.file.flush_if_dirty()
    }
}
