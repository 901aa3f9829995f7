//! Error types for the HAPI provider.
//!
//! Two layers exist. [`ErrorCode`] is the closed vocabulary the host
//! understands; [`ProviderError`] is what the provider internals produce and
//! carries enough context to log and to decide whether session recovery
//! applies.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::host::RequestId;

/// Result alias used by provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    /// Resolution or remote-call failure (default case).
    #[error("NOT_FOUND")]
    NotFound,

    /// Session not authenticated, or a required parent could not be resolved.
    #[error("FAILED")]
    Failed,

    /// Create requested over an already-cached path.
    #[error("EXISTS")]
    Exists,

    /// Open requested on an already-open path.
    #[error("IN_USE")]
    InUse,

    /// Remote 403, or the depth guard rejected the path.
    #[error("ACCESS_DENIED")]
    AccessDenied,

    /// Recovery could not complete and the request cannot be satisfied.
    #[error("ABORT")]
    Abort,
}

impl ErrorCode {
    /// Wire name of the code as the host spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Failed => "FAILED",
            ErrorCode::Exists => "EXISTS",
            ErrorCode::InUse => "IN_USE",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::Abort => "ABORT",
        }
    }
}

/// Errors raised while servicing a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No authenticated session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Path is not in the cache (or the remote no longer lists it).
    #[error("path not found: {0}")]
    NotFound(String),

    /// A parent path required by the operation is not resolved.
    #[error("parent of {0} is not resolved")]
    ParentUnresolved(String),

    /// Entry already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Path already has an open session.
    #[error("already open: {0}")]
    InUse(String),

    /// Destructive operation at or above share-root depth.
    #[error("refusing to modify share-level path: {0}")]
    ShareLevel(String),

    /// Write attempted on a session opened for reading.
    #[error("open request {0} was not opened for writing")]
    ReadOnlyHandle(RequestId),

    /// No open session for this request id.
    #[error("no open file for request {0}")]
    UnknownHandle(RequestId),

    /// A remote call failed. `code` is what the host sees if recovery gives up.
    #[error("remote {operation} failed: {source}")]
    Remote {
        operation: &'static str,
        code: ErrorCode,
        #[source]
        source: GatewayError,
    },

    /// Recovery needed credentials but none are stored.
    #[error("session recovery aborted: no stored credentials")]
    RecoveryAborted,

    /// Explicit login was rejected or could not reach the gatekeeper.
    #[error("login failed: {0}")]
    Login(#[source] GatewayError),

    /// Credential store could not be read or written.
    #[error("credential store error: {0}")]
    Credentials(#[from] crate::store::StoreError),
}

impl ProviderError {
    /// Wrap a gateway failure with the code the host should see for this step.
    pub fn remote(operation: &'static str, code: ErrorCode, source: GatewayError) -> Self {
        ProviderError::Remote {
            operation,
            code,
            source,
        }
    }

    /// The host-facing code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::NotAuthenticated
            | ProviderError::ParentUnresolved(_)
            | ProviderError::Login(_)
            | ProviderError::Credentials(_) => ErrorCode::Failed,
            ProviderError::NotFound(_) | ProviderError::UnknownHandle(_) => ErrorCode::NotFound,
            ProviderError::AlreadyExists(_) => ErrorCode::Exists,
            ProviderError::InUse(_) => ErrorCode::InUse,
            ProviderError::ShareLevel(_) | ProviderError::ReadOnlyHandle(_) => {
                ErrorCode::AccessDenied
            }
            ProviderError::Remote { code, source, .. } => {
                if source.is_forbidden() {
                    ErrorCode::AccessDenied
                } else {
                    *code
                }
            }
            ProviderError::RecoveryAborted => ErrorCode::Abort,
        }
    }

    /// Whether this failure should go through session recovery.
    ///
    /// Only remote failures qualify, and a 403 is final.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProviderError::Remote { source, .. } if !source.is_forbidden())
    }
}

impl From<ProviderError> for ErrorCode {
    fn from(err: ProviderError) -> Self {
        err.code()
    }
}
