//! Path-indexed metadata cache.
//!
//! The gatekeeper has no notion of a single directory tree; the provider
//! builds one by remembering what each listing returned under the virtual
//! path it was listed at. If a path is cached, every non-root ancestor is
//! cached too.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::item::Entry;
use crate::store::{CacheStore, MemoryStore, StoreError};
use crate::vpath;

/// Concurrent map from virtual path to [`Entry`], mirrored to a [`CacheStore`].
pub struct PathCache {
    entries: DashMap<String, Entry>,
    store: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl PathCache {
    /// Cache without durable backing.
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            store: Arc::new(MemoryStore),
        }
    }

    /// Load the full snapshot from `store` before returning.
    ///
    /// Entries whose ancestors are missing from the snapshot are dropped from
    /// both the cache and the store.
    pub fn open(store: Arc<dyn CacheStore>) -> Result<Self, StoreError> {
        let snapshot = store.load()?;
        let known: HashSet<&str> = snapshot.iter().map(|(path, _)| path.as_str()).collect();
        let orphans: Vec<String> = snapshot
            .iter()
            .filter(|(path, _)| {
                vpath::ancestors(path)
                    .iter()
                    .any(|a| !vpath::is_root(a) && !known.contains(a.as_str()))
            })
            .map(|(path, _)| path.clone())
            .collect();
        drop(known);

        let entries: DashMap<String, Entry> = snapshot.into_iter().collect();
        for path in &orphans {
            entries.remove(path);
        }
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "dropping orphaned cache entries from snapshot");
            if let Err(e) = store.remove(&orphans) {
                warn!(error = %e, "failed to prune cache snapshot");
            }
        }

        debug!(entries = entries.len(), "path cache rehydrated");
        Ok(Self { entries, store })
    }

    pub fn get(&self, path: &str) -> Option<Entry> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert or overwrite.
    pub fn set(&self, path: &str, entry: Entry) {
        trace!(path, name = %entry.name, "cache set");
        self.entries.insert(path.to_string(), entry.clone());
        if let Err(e) = self.store.put(path, &entry) {
            warn!(path, error = %e, "failed to persist cache entry");
        }
    }

    /// Insert or overwrite a batch with a single durable write.
    pub fn set_many(&self, batch: Vec<(String, Entry)>) {
        if batch.is_empty() {
            return;
        }
        trace!(count = batch.len(), "cache set batch");
        for (path, entry) in &batch {
            self.entries.insert(path.clone(), entry.clone());
        }
        if let Err(e) = self.store.put_many(&batch) {
            warn!(count = batch.len(), error = %e, "failed to persist cache entries");
        }
    }

    /// Remove `path`, and with `recursive` every path beneath it.
    ///
    /// Returns how many entries were removed.
    pub fn remove(&self, path: &str, recursive: bool) -> usize {
        let mut removed = Vec::new();
        if recursive {
            self.entries.retain(|key, _| {
                if vpath::is_within(key, path) {
                    removed.push(key.clone());
                    false
                } else {
                    true
                }
            });
        } else if self.entries.remove(path).is_some() {
            removed.push(path.to_string());
        }

        if !removed.is_empty() {
            trace!(path, recursive, count = removed.len(), "cache remove");
            if let Err(e) = self.store.remove(&removed) {
                warn!(path, error = %e, "failed to persist cache removal");
            }
        }
        removed.len()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear cache snapshot");
        }
    }

    /// Wait for the durable store to catch up with the in-memory map.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.store.sync()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached paths at or beneath `root`, sorted.
    pub fn paths_within(&self, root: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|item| vpath::is_within(item.key(), root))
            .map(|item| item.key().clone())
            .collect();
        paths.sort();
        paths
    }
}
