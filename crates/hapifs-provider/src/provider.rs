//! The provider façade.
//!
//! [`ProviderAdapter`] owns every piece of provider state: the path cache,
//! the session, open-file sessions and pending requests. It is constructed
//! once and shared behind an `Arc`; the host surface in [`crate::host`]
//! dispatches requests onto the typed operations below.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, info, instrument};

use crate::cache::PathCache;
use crate::config::ProviderConfig;
use crate::credentials::CredentialStore;
use crate::error::{ErrorCode, ProviderError, ProviderResult};
use crate::gateway::GatewayConnector;
use crate::handles::{OpenFile, OpenFiles, OpenMode, PendingRequests};
use crate::host::{HostMount, RequestId};
use crate::item::{Entry, EntryMetadata, RemoteLocation};
use crate::resolver::DirectoryResolver;
use crate::session::{SessionManager, SessionStatus};
use crate::vpath;

/// Virtual filesystem provider backed by a HAPI gatekeeper.
#[derive(Debug)]
pub struct ProviderAdapter {
    config: ProviderConfig,
    cache: Arc<PathCache>,
    session: SessionManager,
    resolver: DirectoryResolver,
    open_files: OpenFiles,
    pending: PendingRequests,
}

impl ProviderAdapter {
    /// Build a provider around an already-loaded cache.
    ///
    /// Open the cache with [`PathCache::open`] to rehydrate it from a durable
    /// snapshot before the first request is served.
    pub fn new(
        config: ProviderConfig,
        connector: Arc<dyn GatewayConnector>,
        credentials: Arc<dyn CredentialStore>,
        host: Arc<dyn HostMount>,
        cache: PathCache,
    ) -> Self {
        let cache = Arc::new(cache);
        let session = SessionManager::new(
            config.clone(),
            connector,
            credentials,
            host,
            Arc::clone(&cache),
        );
        Self {
            config,
            resolver: DirectoryResolver::new(Arc::clone(&cache)),
            cache,
            session,
            open_files: OpenFiles::new(),
            pending: PendingRequests::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub(crate) fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Number of open-file sessions.
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    /// Number of requests dispatched but not yet completed or aborted.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub async fn login(
        &self,
        gatekeeper_url: &str,
        user: &str,
        secret: SecretString,
    ) -> ProviderResult<()> {
        self.session.login(gatekeeper_url, user, secret).await
    }

    /// Log in from stored credentials, if there are any.
    pub async fn resume(&self) -> ProviderResult<bool> {
        self.session.resume().await
    }

    pub fn logout(&self) {
        self.session.logout();
        self.open_files.clear();
    }

    // ------------------------------------------------------------------
    // Host operations
    // ------------------------------------------------------------------

    /// Tear the session down and forget everything cached.
    pub fn unmount(&self) {
        info!("unmount requested");
        self.session.teardown();
        self.open_files.clear();
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub async fn get_metadata(&self, path: &str) -> ProviderResult<EntryMetadata> {
        let path = vpath::normalize(path);
        match path.as_str() {
            vpath::ROOT => return Ok(EntryMetadata::synthetic_directory("")),
            vpath::SHARES => return Ok(EntryMetadata::synthetic_directory("shares")),
            vpath::COMPUTERS => return Ok(EntryMetadata::synthetic_directory("computers")),
            _ => {}
        }

        let entry = self
            .cache
            .get(&path)
            .ok_or_else(|| ProviderError::NotFound(path.clone()))?;
        if !entry.pending_create {
            self.session.reset_retries();
            return Ok(entry.metadata());
        }

        // A locally created file may have been uploaded since; let the
        // parent's listing confirm or replace it.
        let parent = vpath::parent(&path).unwrap_or(vpath::ROOT);
        debug!(parent, "refreshing parent of pending entry");
        let resolver = &self.resolver;
        self.session
            .run("get_metadata", move |gateway| async move {
                resolver.list_directory(gateway.as_ref(), parent).await
            })
            .await?;

        self.cache
            .get(&path)
            .map(|entry| entry.metadata())
            .ok_or(ProviderError::NotFound(path))
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub async fn read_directory(&self, path: &str) -> ProviderResult<Vec<EntryMetadata>> {
        if !self.session.is_authenticated() {
            return Err(ProviderError::NotAuthenticated);
        }
        let path = vpath::normalize(path);
        let path = path.as_str();
        let known = vpath::is_root(path)
            || self
                .cache
                .get(path)
                .is_some_and(|entry| entry.file_identifier.is_some());

        let resolver = &self.resolver;
        let entries = if known {
            self.session
                .run("read_directory", move |gateway| async move {
                    resolver.list_directory(gateway.as_ref(), path).await
                })
                .await?
        } else {
            self.session
                .run("read_directory", move |gateway| async move {
                    resolver.ensure_resolved(gateway.as_ref(), path).await
                })
                .await?
        };
        debug!(count = entries.len(), "directory listed");
        Ok(entries)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn open_file(&self, request_id: RequestId, path: &str, mode: OpenMode) -> ProviderResult<()> {
        let path = vpath::normalize(path);
        if self.open_files.is_open(&path) {
            return Err(ProviderError::InUse(path));
        }
        let entry = self
            .cache
            .get(&path)
            .ok_or_else(|| ProviderError::NotFound(path.clone()))?;
        let file = OpenFile {
            path: path.clone(),
            mode,
            size: entry.size,
        };
        if !self.open_files.open(request_id, file) {
            return Err(ProviderError::InUse(path));
        }
        self.session.reset_retries();
        Ok(())
    }

    /// End an open-file session. Unknown ids are ignored.
    pub fn close_file(&self, open_request_id: RequestId) {
        match self.open_files.close(open_request_id) {
            Some(file) => debug!(open_request_id, path = %file.path, "file closed"),
            None => debug!(open_request_id, "close for unknown open request"),
        }
    }

    /// Read up to `length` bytes at `offset`, clamped to the recorded size.
    #[instrument(level = "debug", skip(self))]
    pub async fn read_file(
        &self,
        open_request_id: RequestId,
        offset: u64,
        length: u64,
    ) -> ProviderResult<Bytes> {
        let file = self
            .open_files
            .get(open_request_id)
            .ok_or(ProviderError::UnknownHandle(open_request_id))?;
        if offset >= file.size {
            return Ok(Bytes::new());
        }
        let end = offset.saturating_add(length).min(file.size);

        let location = self.location_of(&file.path)?;
        let scope = &location.scope();
        let remote_path = location.remote_path.as_str();
        self.session
            .run("read_file", move |gateway| async move {
                gateway
                    .read_range(scope, remote_path, offset, end)
                    .await
                    .map_err(|e| ProviderError::remote("download", ErrorCode::NotFound, e))
            })
            .await
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub async fn create_directory(&self, path: &str) -> ProviderResult<()> {
        let path = vpath::normalize(path);
        if self.cache.contains(&path) {
            return Err(ProviderError::AlreadyExists(path));
        }
        let parent = self.parent_location(&path)?;
        let name = vpath::file_name(&path);

        let scope = &parent.scope();
        let parent_path = parent.remote_path.as_str();
        let created = self
            .session
            .run("create_directory", move |gateway| async move {
                gateway
                    .create_directory(scope, parent_path, name)
                    .await
                    .map_err(|e| ProviderError::remote("create directory", ErrorCode::Failed, e))
            })
            .await?;

        let identifier = RemoteLocation {
            kind: parent.kind,
            agent_id: parent.agent_id.clone(),
            remote_path: created,
        }
        .encode();
        debug!(identifier, "directory created");
        self.cache
            .set(&path, Entry::directory(name, identifier, Utc::now()));
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub async fn delete_entry(&self, path: &str) -> ProviderResult<()> {
        let path = vpath::normalize(path);
        guard_depth(&path)?;
        let entry = self
            .cache
            .get(&path)
            .ok_or_else(|| ProviderError::NotFound(path.clone()))?;

        let Some(location) = entry.location() else {
            debug!("entry was never uploaded, removing locally");
            self.cache.remove(&path, true);
            self.session.reset_retries();
            return Ok(());
        };

        let scope = &location.scope();
        let remote_path = location.remote_path.as_str();
        self.session
            .run("delete_entry", move |gateway| async move {
                gateway
                    .delete(scope, remote_path)
                    .await
                    .map_err(|e| ProviderError::remote("delete", ErrorCode::NotFound, e))
            })
            .await?;

        let removed = self.cache.remove(&path, true);
        debug!(removed, "entry deleted");
        Ok(())
    }

    /// Record a new empty file locally. Nothing is sent until the first write.
    #[instrument(level = "debug", skip(self))]
    pub fn create_file(&self, path: &str) -> ProviderResult<()> {
        let path = vpath::normalize(path);
        if self.cache.contains(&path) {
            return Err(ProviderError::AlreadyExists(path));
        }
        let parent = vpath::parent(&path).unwrap_or(vpath::ROOT);
        if !vpath::is_root(parent) && !self.cache.contains(parent) {
            return Err(ProviderError::ParentUnresolved(path));
        }
        let name = vpath::file_name(&path).to_string();
        self.cache.set(&path, Entry::pending_file(name));
        self.session.reset_retries();
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn copy_entry(&self, source: &str, target: &str) -> ProviderResult<()> {
        let source = vpath::normalize(source);
        let target = vpath::normalize(target);
        guard_depth(&target)?;

        let (location, is_directory) = self.source_of(&source)?;
        let target_path = self.target_remote_path(&target)?;

        let scope = &location.scope();
        let source_path = location.remote_path.as_str();
        let target_path = target_path.as_str();
        self.session
            .run("copy_entry", move |gateway| async move {
                gateway
                    .copy(scope, source_path, target_path, is_directory)
                    .await
                    .map_err(|e| ProviderError::remote("copy", ErrorCode::NotFound, e))
            })
            .await
    }

    /// Rename or move an entry. The new path shows up on its parent's next listing.
    #[instrument(level = "debug", skip(self))]
    pub async fn move_entry(&self, source: &str, target: &str) -> ProviderResult<()> {
        let source = vpath::normalize(source);
        let target = vpath::normalize(target);
        guard_depth(&source)?;
        guard_depth(&target)?;

        let (location, _) = self.source_of(&source)?;
        let target_path = self.target_remote_path(&target)?;

        let scope = &location.scope();
        let source_path = location.remote_path.as_str();
        let target_path = target_path.as_str();
        self.session
            .run("move_entry", move |gateway| async move {
                gateway
                    .rename(scope, source_path, target_path)
                    .await
                    .map_err(|e| ProviderError::remote("rename", ErrorCode::NotFound, e))
            })
            .await?;

        self.cache.remove(&source, true);
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(path = %path, length = length))]
    pub async fn truncate(&self, path: &str, length: u64) -> ProviderResult<()> {
        let path = vpath::normalize(path);
        guard_depth(&path)?;
        let parent = self.parent_location(&path)?;
        let name = vpath::file_name(&path);

        let scope = &parent.scope();
        let parent_path = parent.remote_path.as_str();
        self.session
            .run("truncate", move |gateway| async move {
                gateway
                    .truncate(scope, parent_path, name, length)
                    .await
                    .map_err(|e| ProviderError::remote("truncate", ErrorCode::Failed, e))
            })
            .await?;

        self.refresh(&path).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, data), fields(len = data.len()))]
    pub async fn write_file(
        &self,
        open_request_id: RequestId,
        offset: u64,
        data: Bytes,
    ) -> ProviderResult<()> {
        let file = self
            .open_files
            .get(open_request_id)
            .ok_or(ProviderError::UnknownHandle(open_request_id))?;
        if file.mode != OpenMode::Write {
            return Err(ProviderError::ReadOnlyHandle(open_request_id));
        }
        guard_depth(&file.path)?;
        let parent = self.parent_location(&file.path)?;
        let name = vpath::file_name(&file.path);

        let scope = &parent.scope();
        let parent_path = parent.remote_path.as_str();
        let data = &data;
        self.session
            .run("write_file", move |gateway| async move {
                gateway
                    .write_range(scope, parent_path, name, offset, data.clone())
                    .await
                    .map_err(|e| ProviderError::remote("upload", ErrorCode::Failed, e))
            })
            .await?;

        if let Some(entry) = self.refresh(&file.path).await? {
            self.open_files.set_size(open_request_id, entry.size);
        }
        Ok(())
    }

    /// Forget a pending request so its outcome is never reported.
    pub fn abort(&self, operation_request_id: RequestId) {
        match self.pending.abort(operation_request_id) {
            Some(request) => debug!(
                operation_request_id,
                operation = request.operation,
                elapsed_ms = request.started.elapsed().as_millis(),
                "request aborted"
            ),
            None => debug!(operation_request_id, "abort for unknown request"),
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Drop the cached entry for `path` and re-list its parent.
    async fn refresh(&self, path: &str) -> ProviderResult<Option<Entry>> {
        self.cache.remove(path, false);
        let parent = vpath::parent(path).unwrap_or(vpath::ROOT);
        let resolver = &self.resolver;
        self.session
            .run("refresh", move |gateway| async move {
                resolver.list_directory(gateway.as_ref(), parent).await
            })
            .await?;
        Ok(self.cache.get(path))
    }

    fn location_of(&self, path: &str) -> ProviderResult<RemoteLocation> {
        self.cache
            .get(path)
            .and_then(|entry| entry.location())
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))
    }

    fn parent_location(&self, path: &str) -> ProviderResult<RemoteLocation> {
        vpath::parent(path)
            .and_then(|parent| self.cache.get(parent))
            .and_then(|entry| entry.location())
            .ok_or_else(|| ProviderError::ParentUnresolved(path.to_string()))
    }

    fn source_of(&self, source: &str) -> ProviderResult<(RemoteLocation, bool)> {
        let entry = self
            .cache
            .get(source)
            .ok_or_else(|| ProviderError::NotFound(source.to_string()))?;
        let location = entry
            .location()
            .ok_or_else(|| ProviderError::NotFound(source.to_string()))?;
        Ok((location, entry.is_directory))
    }

    /// Remote path a target would have: its parent's path plus the new name.
    fn target_remote_path(&self, target: &str) -> ProviderResult<String> {
        let parent = vpath::parent(target).unwrap_or(vpath::ROOT);
        let location = self.location_of(parent)?;
        Ok(location.child(vpath::file_name(target)).remote_path)
    }
}

/// Refuse destructive operations on a share root or anything above it.
fn guard_depth(path: &str) -> ProviderResult<()> {
    if vpath::below_share_root(path) {
        Ok(())
    } else {
        debug!(path, "depth guard rejected path");
        Err(ProviderError::ShareLevel(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_guard() {
        assert!(guard_depth("/shares/Finance").is_err());
        assert!(guard_depth("/shares").is_err());
        assert!(guard_depth("/computers/PC1").is_err());
        assert!(guard_depth("/shares/Finance/q1.xlsx").is_ok());
        assert!(guard_depth("/shares/Finance/Reports/q1.xlsx").is_ok());
    }

    #[test]
    fn test_depth_guard_is_access_denied() {
        let err = guard_depth("/shares/Finance").unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);
    }
}
