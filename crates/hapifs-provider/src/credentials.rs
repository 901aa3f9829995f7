//! Stored login credentials.
//!
//! Written on every successful login, read back for silent relogin at
//! startup and during session recovery, cleared on logout.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{StoreError, write_atomically};

/// Gatekeeper URL, user name and secret for one account.
#[derive(Debug)]
pub struct Credentials {
    pub gatekeeper_url: String,
    pub user: String,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(
        gatekeeper_url: impl Into<String>,
        user: impl Into<String>,
        secret: SecretString,
    ) -> Self {
        Self {
            gatekeeper_url: gatekeeper_url.into(),
            user: user.into(),
            secret,
        }
    }

    /// All three fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.gatekeeper_url.is_empty()
            && !self.user.is_empty()
            && !self.secret.expose_secret().is_empty()
    }

    fn duplicate(&self) -> Self {
        Self::new(
            self.gatekeeper_url.clone(),
            self.user.clone(),
            SecretString::from(self.secret.expose_secret().to_owned()),
        )
    }
}

/// Durable key/value blob holding one set of credentials.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, StoreError>;

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(self.inner.lock().as_ref().map(Credentials::duplicate))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self.inner.lock() = Some(credentials.duplicate());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock() = None;
        Ok(())
    }
}

/// On-disk layout of the credential file.
#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    gatekeeper: String,
    user: String,
    pass: String,
}

/// Credentials in a JSON file, readable only by the owner on Unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let stored: StoredCredentials =
            serde_json::from_str(&contents).map_err(|e| StoreError::json(&self.path, e))?;
        let credentials = Credentials::new(
            stored.gatekeeper,
            stored.user,
            SecretString::from(stored.pass),
        );
        Ok(credentials.is_complete().then_some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let stored = StoredCredentials {
            gatekeeper: credentials.gatekeeper_url.clone(),
            user: credentials.user.clone(),
            pass: credentials.secret.expose_secret().to_owned(),
        };
        let contents =
            serde_json::to_vec_pretty(&stored).map_err(|e| StoreError::json(&self.path, e))?;
        // The temp file is 0600 from creation and replaces the old file in one rename.
        write_atomically(&self.path, &contents)?;

        debug!(path = %self.path.display(), user = %credentials.user, "saved credentials");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}
