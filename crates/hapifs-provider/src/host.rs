//! Host-facing surface: request dispatch, completion callbacks and mount control.
//!
//! The host delivers each filesystem operation as a [`Request`] with a
//! request id and a [`Reply`] holding two completion callbacks. Exactly one
//! of them fires per request, unless the request was aborted first.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::handles::OpenMode;
use crate::item::EntryMetadata;
use crate::provider::ProviderAdapter;

/// Host-issued request identifier.
pub type RequestId = u64;

/// One filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Unmount,
    GetMetadata { path: String },
    ReadDirectory { path: String },
    OpenFile { path: String, mode: OpenMode },
    CloseFile { open_request_id: RequestId },
    ReadFile { open_request_id: RequestId, offset: u64, length: u64 },
    CreateDirectory { path: String },
    DeleteEntry { path: String },
    CreateFile { path: String },
    CopyEntry { source: String, target: String },
    MoveEntry { source: String, target: String },
    Truncate { path: String, length: u64 },
    WriteFile { open_request_id: RequestId, offset: u64, data: Bytes },
    Abort { operation_request_id: RequestId },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Unmount => "unmount",
            Operation::GetMetadata { .. } => "get_metadata",
            Operation::ReadDirectory { .. } => "read_directory",
            Operation::OpenFile { .. } => "open_file",
            Operation::CloseFile { .. } => "close_file",
            Operation::ReadFile { .. } => "read_file",
            Operation::CreateDirectory { .. } => "create_directory",
            Operation::DeleteEntry { .. } => "delete_entry",
            Operation::CreateFile { .. } => "create_file",
            Operation::CopyEntry { .. } => "copy_entry",
            Operation::MoveEntry { .. } => "move_entry",
            Operation::Truncate { .. } => "truncate",
            Operation::WriteFile { .. } => "write_file",
            Operation::Abort { .. } => "abort",
        }
    }
}

/// A request as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_id: RequestId,
    pub operation: Operation,
}

impl Request {
    pub fn new(request_id: RequestId, operation: Operation) -> Self {
        Self {
            request_id,
            operation,
        }
    }
}

/// Success payload handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Done,
    Metadata(EntryMetadata),
    Entries(Vec<EntryMetadata>),
    Data(Bytes),
}

/// Completion callbacks for one request.
pub struct Reply {
    on_success: Box<dyn FnOnce(Response) + Send>,
    on_error: Box<dyn FnOnce(ErrorCode) + Send>,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").finish_non_exhaustive()
    }
}

impl Reply {
    pub fn new(
        on_success: impl FnOnce(Response) + Send + 'static,
        on_error: impl FnOnce(ErrorCode) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        }
    }

    /// Reply whose outcome arrives on a oneshot channel.
    ///
    /// The receiver errors if the request was aborted and no callback fired.
    pub fn channel() -> (Self, oneshot::Receiver<Result<Response, ErrorCode>>) {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_err = Arc::clone(&tx);
        let reply = Self::new(
            move |response| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(Ok(response));
                }
            },
            move |code| {
                if let Some(tx) = tx_err.lock().take() {
                    let _ = tx.send(Err(code));
                }
            },
        );
        (reply, rx)
    }

    /// Fire the callback matching `outcome`.
    pub fn complete(self, outcome: Result<Response, ErrorCode>) {
        match outcome {
            Ok(response) => (self.on_success)(response),
            Err(code) => (self.on_error)(code),
        }
    }
}

impl ProviderAdapter {
    /// Service one host request.
    ///
    /// The request id is tracked before this returns, so an abort issued right
    /// after dispatch always finds it. The operation itself runs on a spawned
    /// task; its outcome is delivered only if the request is still tracked
    /// when it finishes. Abort never stops the remote call already in flight.
    pub fn dispatch(self: &Arc<Self>, request: Request, reply: Reply) -> JoinHandle<()> {
        let Request {
            request_id,
            operation,
        } = request;

        if let Operation::Abort {
            operation_request_id,
        } = operation
        {
            self.abort(operation_request_id);
            reply.complete(Ok(Response::Done));
            return tokio::spawn(async {});
        }

        self.pending().begin(request_id, operation.name());
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let name = operation.name();
            let outcome = adapter.execute(request_id, operation).await;
            if adapter.pending().finish(request_id) {
                reply.complete(outcome);
            } else {
                debug!(request_id, operation = name, "request aborted, outcome dropped");
            }
        })
    }

    async fn execute(
        &self,
        request_id: RequestId,
        operation: Operation,
    ) -> Result<Response, ErrorCode> {
        let outcome = match operation {
            Operation::Unmount => {
                self.unmount();
                Ok(Response::Done)
            }
            Operation::GetMetadata { path } => self.get_metadata(&path).await.map(Response::Metadata),
            Operation::ReadDirectory { path } => {
                self.read_directory(&path).await.map(Response::Entries)
            }
            Operation::OpenFile { path, mode } => self
                .open_file(request_id, &path, mode)
                .map(|()| Response::Done),
            Operation::CloseFile { open_request_id } => {
                self.close_file(open_request_id);
                Ok(Response::Done)
            }
            Operation::ReadFile {
                open_request_id,
                offset,
                length,
            } => self
                .read_file(open_request_id, offset, length)
                .await
                .map(Response::Data),
            Operation::CreateDirectory { path } => {
                self.create_directory(&path).await.map(|()| Response::Done)
            }
            Operation::DeleteEntry { path } => self.delete_entry(&path).await.map(|()| Response::Done),
            Operation::CreateFile { path } => self.create_file(&path).map(|()| Response::Done),
            Operation::CopyEntry { source, target } => self
                .copy_entry(&source, &target)
                .await
                .map(|()| Response::Done),
            Operation::MoveEntry { source, target } => self
                .move_entry(&source, &target)
                .await
                .map(|()| Response::Done),
            Operation::Truncate { path, length } => {
                self.truncate(&path, length).await.map(|()| Response::Done)
            }
            Operation::WriteFile {
                open_request_id,
                offset,
                data,
            } => self
                .write_file(open_request_id, offset, data)
                .await
                .map(|()| Response::Done),
            Operation::Abort {
                operation_request_id,
            } => {
                self.abort(operation_request_id);
                Ok(Response::Done)
            }
        };

        outcome.map_err(|e| {
            let code = e.code();
            debug!(request_id, error = %e, code = code.as_str(), "request failed");
            code
        })
    }
}

/// Errors from the host's mount control.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("file system {0} is already mounted")]
    AlreadyMounted(String),

    #[error("file system {0} is not mounted")]
    NotMounted(String),

    #[error("host rejected mount: {0}")]
    Rejected(String),
}

/// Registration details passed to the host on mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    pub file_system_id: String,
    pub display_name: String,
    pub writable: bool,
}

/// Host mount and unmount control.
pub trait HostMount: Send + Sync {
    fn is_mounted(&self, file_system_id: &str) -> bool;

    fn mount(&self, options: &MountOptions) -> Result<(), HostError>;

    fn unmount(&self, file_system_id: &str) -> Result<(), HostError>;
}

/// In-process host that only records which providers are mounted.
#[derive(Debug, Default)]
pub struct LocalHost {
    mounts: Mutex<HashMap<String, MountOptions>>,
    mount_calls: Mutex<usize>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options of a mounted provider.
    pub fn mounted(&self, file_system_id: &str) -> Option<MountOptions> {
        self.mounts.lock().get(file_system_id).cloned()
    }

    /// How many successful mounts have happened.
    pub fn mount_calls(&self) -> usize {
        *self.mount_calls.lock()
    }
}

impl HostMount for LocalHost {
    fn is_mounted(&self, file_system_id: &str) -> bool {
        self.mounts.lock().contains_key(file_system_id)
    }

    fn mount(&self, options: &MountOptions) -> Result<(), HostError> {
        let mut mounts = self.mounts.lock();
        if mounts.contains_key(&options.file_system_id) {
            return Err(HostError::AlreadyMounted(options.file_system_id.clone()));
        }
        info!(id = %options.file_system_id, name = %options.display_name, "mounted");
        mounts.insert(options.file_system_id.clone(), options.clone());
        *self.mount_calls.lock() += 1;
        Ok(())
    }

    fn unmount(&self, file_system_id: &str) -> Result<(), HostError> {
        if self.mounts.lock().remove(file_system_id).is_none() {
            return Err(HostError::NotMounted(file_system_id.to_string()));
        }
        info!(id = %file_system_id, "unmounted");
        Ok(())
    }
}
