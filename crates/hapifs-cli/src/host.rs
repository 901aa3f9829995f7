//! In-process host for the provider.
//!
//! Every command builds one [`Host`], which owns a [`ProviderAdapter`] wired to
//! the HTTP gateway, the on-disk credential store and (unless disabled) the
//! on-disk cache snapshot. Filesystem commands go through request dispatch
//! exactly as an embedding host would drive the provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use secrecy::SecretString;
use tracing::{debug, warn};

use hapifs_gateway::{GatewayConfig, HttpConnector};
use hapifs_provider::{
    EntryMetadata, FileCredentialStore, HostMount, JsonFileStore, LocalHost, OpenMode, Operation,
    PathCache, ProviderAdapter, ProviderConfig, Reply, Request, RequestId, Response, vpath,
};

use crate::config::{self, Config};

/// Bytes requested per read call.
const READ_CHUNK: u64 = 1024 * 1024;

/// Error text used when a command needs a session and none can be resumed.
pub const NOT_LOGGED_IN: &str = "Not logged in. Run `hapifs login` first.";

pub struct Host {
    adapter: Arc<ProviderAdapter>,
    mounts: Arc<LocalHost>,
    next_request_id: AtomicU64,
}

impl Host {
    pub fn open(config: &Config) -> Result<Self> {
        let mut gateway_config = GatewayConfig::default();
        if let Some(timeout) = config.defaults.timeout() {
            gateway_config = gateway_config.timeout(timeout);
        }

        let cache = if config.defaults.persistent_cache() {
            let path = config::cache_path()?;
            let store = JsonFileStore::open(&path)
                .with_context(|| format!("Failed to open cache snapshot: {}", path.display()))?;
            PathCache::open(Arc::new(store)).context("Failed to load cache snapshot")?
        } else {
            PathCache::in_memory()
        };

        let credentials = FileCredentialStore::new(config::credentials_path()?);
        let mounts = Arc::new(LocalHost::new());
        let adapter = ProviderAdapter::new(
            ProviderConfig::default(),
            Arc::new(HttpConnector::new(gateway_config)),
            Arc::new(credentials),
            Arc::clone(&mounts) as Arc<dyn HostMount>,
            cache,
        );

        Ok(Self {
            adapter: Arc::new(adapter),
            mounts,
            next_request_id: AtomicU64::new(1),
        })
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }

    pub fn is_mounted(&self) -> bool {
        self.mounts
            .is_mounted(&self.adapter.config().file_system_id)
    }

    pub async fn login(&self, gatekeeper: &str, user: &str, secret: SecretString) -> Result<()> {
        self.adapter
            .login(gatekeeper, user, secret)
            .await
            .with_context(|| format!("Failed to log in to {gatekeeper} as {user}"))
    }

    /// Resume the stored session, failing if there is none.
    pub async fn connect(&self) -> Result<()> {
        let resumed = self
            .adapter
            .resume()
            .await
            .context("Failed to resume stored session")?;
        if !resumed {
            bail!(NOT_LOGGED_IN);
        }
        Ok(())
    }

    /// Wait for pending cache snapshot writes.
    pub fn sync_cache(&self) {
        if let Err(e) = self.adapter.cache().sync() {
            warn!(error = %e, "failed to write cache snapshot");
        }
    }

    fn next_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, operation: Operation, label: &str) -> Result<Response> {
        let id = self.next_id();
        self.request_as(id, operation, label).await
    }

    async fn request_as(
        &self,
        request_id: RequestId,
        operation: Operation,
        label: &str,
    ) -> Result<Response> {
        debug!(request_id, operation = operation.name(), "dispatching");
        let (reply, outcome) = Reply::channel();
        self.adapter
            .dispatch(Request::new(request_id, operation), reply)
            .await
            .context("Provider task failed")?;
        let outcome = outcome.await.context("Request was aborted")?;
        outcome.map_err(|code| anyhow::Error::new(code).context(label.to_string()))
    }

    async fn done(&self, operation: Operation, label: &str) -> Result<()> {
        self.request(operation, label).await.map(drop)
    }

    /// List `path`, resolving any uncached ancestors first.
    pub async fn list(&self, path: &str) -> Result<Vec<EntryMetadata>> {
        let path = vpath::normalize(path);
        let label = format!("Failed to list {path}");
        match self
            .request(Operation::ReadDirectory { path: path.clone() }, &label)
            .await?
        {
            Response::Entries(entries) => Ok(entries),
            other => bail!("Unexpected response to listing {path}: {other:?}"),
        }
    }

    /// Make sure the directory holding `path` is cached.
    async fn prime(&self, path: &str) -> Result<()> {
        if let Some(parent) = vpath::parent(path) {
            self.list(parent).await?;
        }
        Ok(())
    }

    pub async fn stat(&self, path: &str) -> Result<EntryMetadata> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        let label = format!("Failed to stat {path}");
        match self
            .request(Operation::GetMetadata { path: path.clone() }, &label)
            .await?
        {
            Response::Metadata(metadata) => Ok(metadata),
            other => bail!("Unexpected response to stat {path}: {other:?}"),
        }
    }

    pub async fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        let path = vpath::normalize(path);
        let metadata = self.stat(&path).await?;
        if metadata.is_directory {
            bail!("Is a directory: {path}");
        }

        let handle = self.open_file(&path, OpenMode::Read).await?;
        let result = self.read_chunks(&path, handle, metadata.size).await;
        self.close_file(handle).await;
        result
    }

    async fn read_chunks(&self, path: &str, handle: RequestId, size: u64) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut offset = 0;
        while offset < size {
            let label = format!("Failed to read {path} at offset {offset}");
            let operation = Operation::ReadFile {
                open_request_id: handle,
                offset,
                length: READ_CHUNK,
            };
            let Response::Data(chunk) = self.request(operation, &label).await? else {
                bail!("Unexpected response reading {path}");
            };
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as u64;
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }

    /// Write `data` at `offset`, creating the file if it is not there yet.
    pub async fn write(&self, path: &str, offset: u64, data: Bytes) -> Result<()> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        if !self.adapter.cache().contains(&path) {
            self.done(
                Operation::CreateFile { path: path.clone() },
                &format!("Failed to create {path}"),
            )
            .await?;
        }

        let handle = self.open_file(&path, OpenMode::Write).await?;
        let operation = Operation::WriteFile {
            open_request_id: handle,
            offset,
            data,
        };
        let result = self.done(operation, &format!("Failed to write {path}")).await;
        self.close_file(handle).await;
        result
    }

    /// Create an empty file. An existing file is left alone.
    pub async fn touch(&self, path: &str) -> Result<()> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        if self.adapter.cache().contains(&path) {
            return Ok(());
        }
        self.write(&path, 0, Bytes::new()).await
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        self.done(
            Operation::CreateDirectory { path: path.clone() },
            &format!("Failed to create directory {path}"),
        )
        .await
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        self.done(
            Operation::DeleteEntry { path: path.clone() },
            &format!("Failed to remove {path}"),
        )
        .await
    }

    pub async fn copy(&self, source: &str, target: &str) -> Result<()> {
        let (source, target) = (vpath::normalize(source), vpath::normalize(target));
        self.prime(&source).await?;
        self.prime(&target).await?;
        let label = format!("Failed to copy {source} to {target}");
        self.done(Operation::CopyEntry { source, target }, &label).await
    }

    pub async fn rename(&self, source: &str, target: &str) -> Result<()> {
        let (source, target) = (vpath::normalize(source), vpath::normalize(target));
        self.prime(&source).await?;
        self.prime(&target).await?;
        let label = format!("Failed to move {source} to {target}");
        self.done(Operation::MoveEntry { source, target }, &label).await
    }

    pub async fn truncate(&self, path: &str, length: u64) -> Result<()> {
        let path = vpath::normalize(path);
        self.prime(&path).await?;
        self.done(
            Operation::Truncate {
                path: path.clone(),
                length,
            },
            &format!("Failed to truncate {path}"),
        )
        .await
    }

    async fn open_file(&self, path: &str, mode: OpenMode) -> Result<RequestId> {
        let handle = self.next_id();
        self.request_as(
            handle,
            Operation::OpenFile {
                path: path.to_string(),
                mode,
            },
            &format!("Failed to open {path}"),
        )
        .await?;
        Ok(handle)
    }

    async fn close_file(&self, handle: RequestId) {
        let operation = Operation::CloseFile {
            open_request_id: handle,
        };
        if let Err(e) = self.request(operation, "Failed to close file").await {
            debug!(error = %e, "close failed");
        }
    }
}
