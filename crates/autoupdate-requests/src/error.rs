//! # Design
//!
//! - Provide structured, constant-message errors for each stage of request handling.
//! - Capture operation context (paths, fields, repositories) so failures are reproducible.
//! - Keep per-request failures (`RequestError`) apart from drain-level failures
//!   (`StoreError`, `WatchError`) so only the latter can stop the daemon.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for handling one request.
pub type RequestResult<T> = Result<T, RequestError>;
/// Result alias for requests directory operations.
pub type StoreResult<T> = Result<T, StoreError>;
/// Result alias for lock file operations.
pub type LockResult<T> = Result<T, LockError>;
/// Result alias for update service calls.
pub type UpdateServiceResult<T> = Result<T, UpdateServiceError>;
/// Result alias for the watch loop.
pub type WatchResult<T> = Result<T, WatchError>;

/// Stage of request handling a [`RequestError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    /// Reading or parsing the request file.
    Content,
    /// Structural validation of the parsed descriptor.
    Validation,
    /// Repository type resolution and manifest lookup.
    Dispatch,
    /// Calls into the update service.
    ExternalService,
}

impl RequestStage {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Validation => "validation",
            Self::Dispatch => "dispatch",
            Self::ExternalService => "external_service",
        }
    }
}

/// Failures that abort the handling of a single request file.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request file could not be read.
    #[error("request file unreadable")]
    Read {
        /// Path of the request file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The request file was not a YAML document.
    #[error("request file unparsable")]
    Parse {
        /// Path of the request file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// The requests directory lock could not be taken for the read.
    #[error("request read lock unavailable")]
    ReadLock {
        /// Path of the request file.
        path: PathBuf,
        /// Underlying lock error.
        source: LockError,
    },
    /// The parsed descriptor failed a structural check.
    #[error("request failed validation")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A repository type outside `tasks`, `contests`, `users` reached dispatch.
    #[error("unrecognized repository type")]
    UnrecognizedRepoType {
        /// Repository path carried by the request.
        repo: String,
    },
    /// A contest manifest could not be read.
    #[error("contest manifest unreadable")]
    ManifestRead {
        /// Contest whose manifest was requested.
        contest: String,
        /// Manifest path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A contest manifest was not in the expected shape.
    #[error("contest manifest unparsable")]
    ManifestParse {
        /// Contest whose manifest was requested.
        contest: String,
        /// Manifest path.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// The update service reported a failure.
    #[error("update service call failed")]
    ExternalService {
        /// Update operation that failed.
        operation: &'static str,
        /// Repository the operation targeted, when any.
        target: Option<String>,
        /// Underlying service error.
        source: UpdateServiceError,
    },
}

impl RequestError {
    pub(crate) const fn validation(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::Validation {
            field,
            reason,
            value,
        }
    }

    pub(crate) fn external(
        operation: &'static str,
        target: Option<&str>,
        source: UpdateServiceError,
    ) -> Self {
        Self::ExternalService {
            operation,
            target: target.map(str::to_string),
            source,
        }
    }

    /// Stage of handling that produced this error.
    #[must_use]
    pub const fn stage(&self) -> RequestStage {
        match self {
            Self::Read { .. } | Self::Parse { .. } | Self::ReadLock { .. } => {
                RequestStage::Content
            }
            Self::Validation { .. } => RequestStage::Validation,
            Self::UnrecognizedRepoType { .. }
            | Self::ManifestRead { .. }
            | Self::ManifestParse { .. } => RequestStage::Dispatch,
            Self::ExternalService { .. } => RequestStage::ExternalService,
        }
    }
}

/// Failures raised while listing or deleting request files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requests directory is missing or not a directory.
    #[error("requests directory unavailable")]
    RequestsDir {
        /// Configured requests directory.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Listing the requests directory failed.
    #[error("requests directory listing failed")]
    List {
        /// Requests directory.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A deletion target resolved outside the requests directory.
    #[error("refusing to delete outside the requests directory")]
    OutsideRequestsDir {
        /// Resolved deletion target.
        path: PathBuf,
        /// Requests directory the target should live in.
        requests_dir: PathBuf,
    },
}

impl StoreError {
    /// Whether the daemon must stop instead of continuing to the next drain.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::OutsideRequestsDir { .. })
    }
}

/// Failures raised by lock files.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock stayed held by someone else for the whole timeout.
    #[error("lock acquisition timed out")]
    Timeout {
        /// Lock file path.
        path: PathBuf,
        /// Time spent waiting.
        timeout: Duration,
    },
    /// IO failure while creating, inspecting, or removing the lock file.
    #[error("lock file io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Encoding the lock record failed.
    #[error("lock record encoding failed")]
    Record {
        /// Lock file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl LockError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by an update service implementation.
#[derive(Debug, Error)]
pub enum UpdateServiceError {
    /// The exclusive update scope could not be entered.
    #[error("update scope unavailable")]
    Scope {
        /// Underlying lock error.
        source: LockError,
    },
    /// The updater program could not be started.
    #[error("updater could not be started")]
    Spawn {
        /// Update operation being attempted.
        operation: &'static str,
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The updater program exited unsuccessfully.
    #[error("updater exited unsuccessfully")]
    Exit {
        /// Update operation being attempted.
        operation: &'static str,
        /// Exit code, absent when terminated by a signal.
        code: Option<i32>,
    },
    /// Any other failure reported by the service.
    #[error("update operation failed")]
    Operation {
        /// Update operation being attempted.
        operation: &'static str,
        /// Human-readable detail from the service.
        detail: String,
    },
}

/// Failures that end the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The notification backend could not be set up.
    #[error("directory watch setup failed")]
    Backend {
        /// Watched directory.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// The notification channel closed.
    #[error("directory notifications stopped")]
    Closed,
    /// A drain hit a fatal store error.
    #[error("drain aborted")]
    Drain {
        /// Underlying store error.
        source: StoreError,
    },
}
