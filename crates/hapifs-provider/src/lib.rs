//! Virtual filesystem provider for HAPI gatekeeper file stores.
//!
//! A HAPI gatekeeper brokers access to directory-service shares and to the
//! file trees of managed agents. This crate presents all of them as one
//! virtual tree:
//!
//! ```text
//! /
//! ├── shares/<share>/...      directory-service shares
//! └── computers/<computer>/... managed agents and directory-service computers
//! ```
//!
//! # Components
//!
//! - [`ProviderAdapter`] - The provider itself: one typed method per host operation
//! - [`Request`], [`Reply`] - Host callback surface, see [`ProviderAdapter::dispatch`]
//! - [`SessionManager`] - Login state and transparent session recovery
//! - [`PathCache`] - Virtual path to [`Entry`] map, optionally backed by a [`CacheStore`]
//! - [`DirectoryResolver`] - Ancestor backfill and directory listing
//! - [`RemoteGateway`] - Contract for the remote side, implemented over HTTP by `hapifs-gateway`
//! - [`CredentialStore`] - Durable credentials for silent relogin
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hapifs_provider::{
//!     GatewayConnector, GatewayError, GatewayResult, LocalHost, MemoryCredentialStore,
//!     PathCache, ProviderAdapter, ProviderConfig, RemoteGateway,
//! };
//!
//! struct Offline;
//!
//! impl GatewayConnector for Offline {
//!     fn connect(&self, url: &str) -> GatewayResult<Arc<dyn RemoteGateway>> {
//!         Err(GatewayError::InvalidGatekeeper(url.to_string()))
//!     }
//! }
//!
//! let provider = ProviderAdapter::new(
//!     ProviderConfig::default(),
//!     Arc::new(Offline),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(LocalHost::new()),
//!     PathCache::in_memory(),
//! );
//! assert!(!provider.session().is_authenticated());
//! ```

mod cache;
mod config;
mod credentials;
mod error;
mod gateway;
mod handles;
mod host;
mod item;
mod provider;
mod resolver;
mod session;
mod store;
pub mod vpath;

pub use cache::PathCache;
pub use config::{DEFAULT_DISPLAY_NAME, DEFAULT_FILE_SYSTEM_ID, DEFAULT_MAX_RETRIES, ProviderConfig};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{ErrorCode, ProviderError, ProviderResult};
pub use gateway::{
    AgentInfo, DIRECTORY_MARKER_NAME, GatewayConnector, GatewayError, GatewayResult, ListFilter,
    LoginInfo, RemoteGateway, RemoteItem, Scope,
};
pub use handles::{HandleTable, OpenFile, OpenFiles, OpenMode, PendingRequest, PendingRequests};
pub use host::{
    HostError, HostMount, LocalHost, MountOptions, Operation, Reply, Request, RequestId, Response,
};
pub use item::{
    Entry, EntryMetadata, ProviderKind, RemoteLocation, decode_identifier, encode_identifier,
    join_remote,
};
pub use provider::ProviderAdapter;
pub use resolver::DirectoryResolver;
pub use session::{SessionManager, SessionPhase, SessionStatus};
pub use store::{CacheStore, JsonFileStore, MemoryStore, StoreError};
