//! Cached entry types and file identifier encoding.
//!
//! Every remote object is addressed by an opaque file identifier. The
//! gatekeeper hands out raw remote paths for shares; the provider tags the
//! ones that belong to a managed agent or to a directory-service computer
//! with a textual prefix so a single string is enough to route a later call:
//!
//! | Kind      | Identifier                | Remote path         |
//! |-----------|---------------------------|---------------------|
//! | Share     | `\\srv\Finance\q1.xlsx`   | same as identifier  |
//! | Agent     | `agent12:C:\Users`        | `C:\Users`          |
//! | Directory | `directoryPC1:/C$`        | `\\PC1\C$`          |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::Scope;

const AGENT_PREFIX: &str = "agent";
const DIRECTORY_PREFIX: &str = "directory";
const UNC_PREFIX: &str = "\\\\";

/// Which remote subsystem owns a file identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Directory-service share reached directly through the gatekeeper.
    Share,
    /// File tree exposed by a managed agent.
    Agent,
    /// Share on a computer known to the directory service but without an agent.
    Directory,
}

/// Decoded form of a file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteLocation {
    pub kind: ProviderKind,
    pub agent_id: Option<String>,
    pub remote_path: String,
}

impl RemoteLocation {
    pub fn share(remote_path: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Share,
            agent_id: None,
            remote_path: remote_path.into(),
        }
    }

    pub fn agent(agent_id: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Agent,
            agent_id: Some(agent_id.into()),
            remote_path: remote_path.into(),
        }
    }

    pub fn directory(remote_path: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Directory,
            agent_id: None,
            remote_path: remote_path.into(),
        }
    }

    /// Gateway scope a call for this location must be routed through.
    pub fn scope(&self) -> Scope {
        match (self.kind, &self.agent_id) {
            (ProviderKind::Agent, Some(id)) => Scope::Agent(id.clone()),
            (ProviderKind::Directory, _) => Scope::Directory,
            _ => Scope::Share,
        }
    }

    /// Location of a child object, keeping this location's kind and agent.
    pub fn child(&self, name: &str) -> Self {
        Self {
            kind: self.kind,
            agent_id: self.agent_id.clone(),
            remote_path: join_remote(&self.remote_path, name),
        }
    }

    /// Re-encode into an opaque identifier.
    pub fn encode(&self) -> String {
        encode_identifier(self.kind, self.agent_id.as_deref(), &self.remote_path)
    }
}

/// Encode a `(kind, agent id, remote path)` triple as a file identifier.
///
/// # Examples
///
/// ```
/// use hapifs_provider::{decode_identifier, encode_identifier, ProviderKind};
///
/// let id = encode_identifier(ProviderKind::Agent, Some("12"), "C:\\Users");
/// assert_eq!(id, "agent12:C:\\Users");
/// assert_eq!(decode_identifier(&id).remote_path, "C:\\Users");
/// ```
pub fn encode_identifier(kind: ProviderKind, agent_id: Option<&str>, remote_path: &str) -> String {
    match kind {
        ProviderKind::Share => remote_path.to_string(),
        ProviderKind::Agent => {
            format!("{AGENT_PREFIX}{}:{remote_path}", agent_id.unwrap_or_default())
        }
        ProviderKind::Directory => {
            let unc = remote_path.strip_prefix(UNC_PREFIX).unwrap_or(remote_path);
            let (host, tail) = unc.split_once('\\').unwrap_or((unc, ""));
            format!("{DIRECTORY_PREFIX}{host}:/{tail}")
        }
    }
}

/// Decode a file identifier.
///
/// Never fails: anything without a well-formed prefix is a Share identifier
/// whose remote path is the input itself.
pub fn decode_identifier(identifier: &str) -> RemoteLocation {
    decode_agent(identifier)
        .or_else(|| decode_directory(identifier))
        .unwrap_or_else(|| RemoteLocation::share(identifier))
}

fn decode_agent(identifier: &str) -> Option<RemoteLocation> {
    let rest = identifier.strip_prefix(AGENT_PREFIX)?;
    let (id, remote_path) = rest.split_once(':')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(RemoteLocation::agent(id, remote_path))
}

fn decode_directory(identifier: &str) -> Option<RemoteLocation> {
    let rest = identifier.strip_prefix(DIRECTORY_PREFIX)?;
    let (host, tail) = rest.split_once(':')?;
    let tail = tail.strip_prefix('/')?;
    if host.is_empty() || host.contains('\\') {
        return None;
    }
    let remote_path = if tail.is_empty() {
        format!("{UNC_PREFIX}{host}")
    } else {
        format!("{UNC_PREFIX}{host}\\{tail}")
    };
    Some(RemoteLocation::directory(remote_path))
}

/// Append a name to a remote path using the parent's separator style.
///
/// UNC-style paths (`\\host\share`) use backslashes, everything else `/`.
pub fn join_remote(parent: &str, name: &str) -> String {
    let sep = if parent.starts_with(UNC_PREFIX) || (parent.contains('\\') && !parent.contains('/'))
    {
        '\\'
    } else {
        '/'
    };
    if parent.is_empty() {
        name.to_string()
    } else if parent.ends_with(['\\', '/']) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{sep}{name}")
    }
}

/// Metadata for one virtual path, as held by the path cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub is_directory: bool,
    pub name: String,
    pub size: u64,
    pub modification_time: DateTime<Utc>,
    /// Remote identifier; absent for files created locally and not yet uploaded.
    pub file_identifier: Option<String>,
    /// Created locally, not yet confirmed by a remote listing.
    #[serde(default)]
    pub pending_create: bool,
}

impl Entry {
    /// Directory entry backed by a remote identifier.
    pub fn directory(
        name: impl Into<String>,
        file_identifier: impl Into<String>,
        modification_time: DateTime<Utc>,
    ) -> Self {
        Self {
            is_directory: true,
            name: name.into(),
            size: 0,
            modification_time,
            file_identifier: Some(file_identifier.into()),
            pending_create: false,
        }
    }

    /// Empty file created locally, waiting for its first upload.
    pub fn pending_file(name: impl Into<String>) -> Self {
        Self {
            is_directory: false,
            name: name.into(),
            size: 0,
            modification_time: Utc::now(),
            file_identifier: None,
            pending_create: true,
        }
    }

    /// Decoded identifier, if the entry has one.
    pub fn location(&self) -> Option<RemoteLocation> {
        self.file_identifier.as_deref().map(decode_identifier)
    }

    /// Host-facing view of this entry.
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            is_directory: self.is_directory,
            name: self.name.clone(),
            size: self.size,
            modification_time: self.modification_time,
        }
    }
}

/// Metadata returned to the host for stat and directory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    pub is_directory: bool,
    pub name: String,
    pub size: u64,
    pub modification_time: DateTime<Utc>,
}

impl EntryMetadata {
    /// Synthetic directory used for the virtual roots.
    pub fn synthetic_directory(name: &str) -> Self {
        Self {
            is_directory: true,
            name: name.to_string(),
            size: 0,
            modification_time: Utc::now(),
        }
    }
}
