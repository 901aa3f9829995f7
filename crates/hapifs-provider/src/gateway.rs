//! Contract for the remote gatekeeper.
//!
//! The provider never talks HTTP itself. Everything remote goes through a
//! [`RemoteGateway`], built per gatekeeper URL by a [`GatewayConnector`].
//! The `hapifs-gateway` crate supplies the HTTP implementation; tests use an
//! in-memory one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;

use crate::item::join_remote;

/// Name of the marker object used to create directories.
pub const DIRECTORY_MARKER_NAME: &str = "hapi.txt";

/// Result alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors reported by a gateway implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gatekeeper answered with a non-success HTTP status.
    #[error("gatekeeper returned HTTP {0}")]
    Status(u16),

    /// Login was rejected.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The gatekeeper URL is unusable.
    #[error("invalid gatekeeper URL: {0}")]
    InvalidGatekeeper(String),
}

impl GatewayError {
    /// Whether the gatekeeper refused access (HTTP 403).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, GatewayError::Status(403))
    }
}

/// Routing scope for a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Roster of top-level shares.
    Shares,
    /// A directory-service share.
    Share,
    /// A managed agent's file tree.
    Agent(String),
    /// A computer reached through the directory service.
    Directory,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Shares => f.write_str("shares"),
            Scope::Share => f.write_str("share"),
            Scope::Agent(id) => write!(f, "agent/{id}/share"),
            Scope::Directory => f.write_str("directory"),
        }
    }
}

/// Successful login.
#[derive(Debug)]
pub struct LoginInfo {
    pub token: SecretString,
    pub user_id: String,
    pub display_name: String,
}

/// One item of a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub remote_id: String,
    pub is_directory: bool,
}

/// One computer from the agent roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    /// `-1` for computers known only to the directory service.
    pub agent_id: i64,
}

/// Listing filter passed through to the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub filter_type: u32,
    pub operation: u32,
    pub value_type: u32,
    pub value: String,
}

/// Remote calls needed by the provider.
///
/// `identifier` arguments are decoded remote paths, never prefixed file
/// identifiers. Ranges are half-open.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Authenticate and keep the session token for later calls.
    async fn login(&self, user: &str, secret: &SecretString) -> GatewayResult<LoginInfo>;

    /// List the children of a remote directory.
    async fn list(
        &self,
        scope: &Scope,
        identifier: &str,
        filters: &[ListFilter],
        max_depth: u32,
    ) -> GatewayResult<Vec<RemoteItem>>;

    /// List every managed computer.
    async fn list_agents(&self) -> GatewayResult<Vec<AgentInfo>>;

    /// Read bytes `[start, end)` of a remote file.
    async fn read_range(
        &self,
        scope: &Scope,
        identifier: &str,
        start: u64,
        end: u64,
    ) -> GatewayResult<Bytes>;

    /// Write `data` at `offset` into file `name` inside directory `identifier`.
    async fn write_range(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> GatewayResult<()>;

    /// Set the length of file `name` inside directory `identifier`.
    async fn truncate(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        length: u64,
    ) -> GatewayResult<()>;

    async fn delete(&self, scope: &Scope, identifier: &str) -> GatewayResult<()>;

    async fn rename(&self, scope: &Scope, source: &str, target: &str) -> GatewayResult<()>;

    async fn copy(
        &self,
        scope: &Scope,
        source: &str,
        target: &str,
        is_directory: bool,
    ) -> GatewayResult<()>;

    /// Create directory `name` under `parent` and return its remote path.
    ///
    /// The gatekeeper has no mkdir. Uploading a marker into the new path
    /// creates the directory as a side effect; the marker is then deleted.
    async fn create_directory(
        &self,
        scope: &Scope,
        parent: &str,
        name: &str,
    ) -> GatewayResult<String> {
        let directory = join_remote(parent, name);
        self.write_range(scope, &directory, DIRECTORY_MARKER_NAME, 0, Bytes::new())
            .await?;
        self.delete(scope, &join_remote(&directory, DIRECTORY_MARKER_NAME))
            .await?;
        Ok(directory)
    }
}

/// Builds a gateway for a gatekeeper URL.
pub trait GatewayConnector: Send + Sync {
    fn connect(&self, gatekeeper_url: &str) -> GatewayResult<Arc<dyn RemoteGateway>>;
}
