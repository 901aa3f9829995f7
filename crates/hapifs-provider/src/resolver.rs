//! Directory listing and cache backfill.
//!
//! A directory can only be listed once its own file identifier is known, and
//! that identifier only comes from listing its parent. [`DirectoryResolver`]
//! walks a path from the top, listing each parent whose child is missing from
//! the cache, before listing the target itself.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::cache::PathCache;
use crate::error::{ErrorCode, ProviderError, ProviderResult};
use crate::gateway::{AgentInfo, RemoteGateway, RemoteItem, Scope};
use crate::item::{Entry, EntryMetadata, ProviderKind, RemoteLocation};
use crate::vpath;

/// Agent id the roster uses for computers reached through the directory service.
const DIRECTORY_SERVICE_AGENT: i64 = -1;

/// Lists directories and keeps the path cache populated.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    cache: Arc<PathCache>,
}

impl DirectoryResolver {
    pub fn new(cache: Arc<PathCache>) -> Self {
        Self { cache }
    }

    /// List `path`, first backfilling every ancestor missing from the cache.
    #[instrument(level = "debug", skip(self, gateway))]
    pub async fn ensure_resolved(
        &self,
        gateway: &dyn RemoteGateway,
        path: &str,
    ) -> ProviderResult<Vec<EntryMetadata>> {
        let path = vpath::normalize(path);
        let segments = vpath::segments(&path);

        for depth in 1..segments.len() {
            let child = format!("/{}", segments[..=depth].join("/"));
            if self.cache.contains(&child) {
                continue;
            }
            let dir = format!("/{}", segments[..depth].join("/"));
            debug!(dir, child, "backfilling ancestor");
            self.list_directory(gateway, &dir).await?;
            if !self.cache.contains(&child) {
                return Err(ProviderError::NotFound(child));
            }
        }

        self.list_directory(gateway, &path).await
    }

    /// List one directory whose identifier is already known (or a root).
    pub async fn list_directory(
        &self,
        gateway: &dyn RemoteGateway,
        path: &str,
    ) -> ProviderResult<Vec<EntryMetadata>> {
        match path {
            vpath::ROOT => Ok(vec![
                EntryMetadata::synthetic_directory("shares"),
                EntryMetadata::synthetic_directory("computers"),
            ]),
            vpath::SHARES => {
                let items = gateway
                    .list(&Scope::Shares, "", &[], 0)
                    .await
                    .map_err(|e| ProviderError::remote("list shares", ErrorCode::NotFound, e))?;
                Ok(self.store_listing(path, items.into_iter().map(share_entry)))
            }
            vpath::COMPUTERS => {
                let agents = gateway
                    .list_agents()
                    .await
                    .map_err(|e| ProviderError::remote("list agents", ErrorCode::NotFound, e))?;
                Ok(self.store_listing(path, agents.into_iter().map(computer_entry)))
            }
            _ => {
                let location = self
                    .cache
                    .get(path)
                    .filter(|entry| entry.is_directory)
                    .and_then(|entry| entry.location())
                    .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
                let items = gateway
                    .list(&location.scope(), &location.remote_path, &[], 0)
                    .await
                    .map_err(|e| ProviderError::remote("list", ErrorCode::NotFound, e))?;
                Ok(self.store_listing(
                    path,
                    items.into_iter().map(|item| child_entry(&location, item)),
                ))
            }
        }
    }

    /// Upsert each entry under `dir`, keeping only the first of each name.
    fn store_listing(
        &self,
        dir: &str,
        entries: impl Iterator<Item = Entry>,
    ) -> Vec<EntryMetadata> {
        let mut seen = HashSet::new();
        let mut listing = Vec::new();
        let mut batch = Vec::new();
        for entry in entries {
            if !seen.insert(entry.name.clone()) {
                debug!(dir, name = %entry.name, "dropping duplicate listing item");
                continue;
            }
            listing.push(entry.metadata());
            batch.push((vpath::join(dir, &entry.name), entry));
        }
        self.cache.set_many(batch);
        listing
    }
}

fn share_entry(item: RemoteItem) -> Entry {
    Entry {
        is_directory: true,
        name: item.name,
        size: item.size,
        modification_time: item.last_modified,
        file_identifier: Some(item.remote_id),
        pending_create: false,
    }
}

fn computer_entry(agent: AgentInfo) -> Entry {
    let location = if agent.agent_id == DIRECTORY_SERVICE_AGENT {
        RemoteLocation::directory(format!("\\\\{}", agent.name))
    } else {
        RemoteLocation::agent(agent.agent_id.to_string(), "/")
    };
    Entry::directory(agent.name, location.encode(), Utc::now())
}

/// Agent children keep their agent prefix; everything else uses the raw id.
fn child_entry(parent: &RemoteLocation, item: RemoteItem) -> Entry {
    let file_identifier = match parent.kind {
        ProviderKind::Agent => RemoteLocation {
            kind: ProviderKind::Agent,
            agent_id: parent.agent_id.clone(),
            remote_path: item.remote_id,
        }
        .encode(),
        ProviderKind::Share | ProviderKind::Directory => item.remote_id,
    };
    Entry {
        is_directory: item.is_directory,
        name: item.name,
        size: item.size,
        modification_time: item.last_modified,
        file_identifier: Some(file_identifier),
        pending_create: false,
    }
}
