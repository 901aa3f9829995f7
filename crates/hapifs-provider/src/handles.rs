//! Open-file sessions and in-flight request tracking.
//!
//! Both tables are keyed by host request ids and backed by `DashMap`, so
//! concurrent operations never need a provider-wide lock.

use std::hash::Hash;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::host::RequestId;

/// Concurrent map from handle key to handle value.
#[derive(Debug)]
pub struct HandleTable<K, V>
where
    K: Eq + Hash,
{
    handles: DashMap<K, V>,
}

impl<K, V> Default for HandleTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HandleTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Insert, replacing any previous value.
    pub fn insert(&self, key: K, value: V) {
        self.handles.insert(key, value);
    }

    /// Insert only if `key` is vacant. Returns whether the insert happened.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        match self.handles.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.handles.remove(key).map(|(_, v)| v)
    }

    /// Remove only if the current value satisfies `predicate`.
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        self.handles.remove_if(key, |_, v| predicate(v)).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.handles.contains_key(key)
    }

    /// Apply `f` to the value under `key`, if present.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.handles.get_mut(key) {
            Some(mut value) => {
                f(value.value_mut());
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&self) {
        self.handles.clear();
    }
}

impl<K, V> HandleTable<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.handles.get(key).map(|v| v.value().clone())
    }
}

/// How a file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    Write,
}

/// One open-file session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub path: String,
    pub mode: OpenMode,
    pub size: u64,
}

/// Open sessions, at most one per virtual path.
#[derive(Debug, Default)]
pub struct OpenFiles {
    by_path: HandleTable<String, RequestId>,
    by_request: HandleTable<RequestId, OpenFile>,
}

impl OpenFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under the opening request id.
    ///
    /// Returns false, changing nothing, if the path is already open.
    pub fn open(&self, open_request_id: RequestId, file: OpenFile) -> bool {
        if !self.by_path.insert_if_absent(file.path.clone(), open_request_id) {
            return false;
        }
        self.by_request.insert(open_request_id, file);
        true
    }

    /// End a session. Unknown ids are ignored.
    pub fn close(&self, open_request_id: RequestId) -> Option<OpenFile> {
        let file = self.by_request.remove(&open_request_id)?;
        self.by_path
            .remove_if(&file.path, |owner| *owner == open_request_id);
        Some(file)
    }

    pub fn get(&self, open_request_id: RequestId) -> Option<OpenFile> {
        self.by_request.get(&open_request_id)
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.by_path.contains(&path.to_string())
    }

    /// Record a new size for a session after its file changed remotely.
    pub fn set_size(&self, open_request_id: RequestId, size: u64) {
        self.by_request.update(&open_request_id, |file| file.size = size);
    }

    pub fn len(&self) -> usize {
        self.by_request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }

    pub fn clear(&self) {
        self.by_request.clear();
        self.by_path.clear();
    }
}

/// Bookkeeping for a request that has not completed yet.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub operation: &'static str,
    pub started: Instant,
}

/// Requests currently in flight.
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HandleTable<RequestId, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, request_id: RequestId, operation: &'static str) {
        self.requests.insert(
            request_id,
            PendingRequest {
                operation,
                started: Instant::now(),
            },
        );
    }

    /// Release a completed request. False means it was aborted meanwhile.
    pub fn finish(&self, request_id: RequestId) -> bool {
        self.requests.remove(&request_id).is_some()
    }

    /// Forget a request so its outcome is never delivered.
    pub fn abort(&self, request_id: RequestId) -> Option<PendingRequest> {
        self.requests.remove(&request_id)
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.requests.contains(&request_id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
