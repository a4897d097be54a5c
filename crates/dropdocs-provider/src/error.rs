//! Host-facing error taxonomy.
//!
//! Remote failures are translated into [`ProviderError`] at the adapter
//! boundary, so the host only ever sees this fixed set of outcomes.

use dropdocs_remote::RemoteError;
use thiserror::Error;

/// Error type for document-provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No credential is stored
    #[error("not logged in")]
    AuthenticationRequired,

    /// The stored credential was rejected, has expired or cannot be parsed
    #[error("authentication failed: {0}")]
    AuthenticationInvalid(String),

    /// No document exists at the path
    #[error("document not found: {0}")]
    RemoteNotFound(String),

    /// The remote tree holds something incompatible at the path
    #[error("conflicting remote entry at {0}")]
    RemoteConflict(String),

    /// Remote size never matched the local size after an upload
    #[error(
        "upload of {path} incomplete after {attempts} attempts: expected {expected} bytes, remote reports {actual}"
    )]
    TransferIncomplete {
        /// Document path
        path: String,
        /// Local byte count
        expected: u64,
        /// Last remote byte count
        actual: u64,
        /// Upload attempts made
        attempts: u32,
    },

    /// Spool file creation or access failed
    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other remote failure (transport, rate limit, unexpected status)
    #[error("remote error: {0}")]
    Remote(String),
}

impl ProviderError {
    /// Get the errno-like error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            ProviderError::AuthenticationRequired | ProviderError::AuthenticationInvalid(_) => {
                libc::EACCES
            }
            ProviderError::RemoteNotFound(_) | ProviderError::LocalIo(_) => libc::ENOENT,
            ProviderError::RemoteConflict(_) => libc::EEXIST,
            ProviderError::InvalidArgument(_) => libc::EINVAL,
            ProviderError::TransferIncomplete { .. } | ProviderError::Remote(_) => libc::EIO,
        }
    }

    /// Stable identifier for the error kind.
    pub fn error_domain(&self) -> &'static str {
        match self {
            ProviderError::AuthenticationRequired => "NotAuthenticated",
            ProviderError::AuthenticationInvalid(_) => "AuthenticationInvalid",
            ProviderError::RemoteNotFound(_) => "NoSuchItem",
            ProviderError::RemoteConflict(_) => "FilenameCollision",
            ProviderError::TransferIncomplete { .. } => "TransferIncomplete",
            ProviderError::LocalIo(_) => "LocalIoFailure",
            ProviderError::InvalidArgument(_) => "InvalidArgument",
            ProviderError::Remote(_) => "ServerUnreachable",
        }
    }

    /// Whether the user has to log in (again) to recover.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationRequired | ProviderError::AuthenticationInvalid(_)
        )
    }
}

impl From<RemoteError> for ProviderError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::MalformedCredential(_)
            | RemoteError::AuthExpired
            | RemoteError::AuthInvalid(_) => ProviderError::AuthenticationInvalid(e.to_string()),
            RemoteError::NotFound(path) => ProviderError::RemoteNotFound(path),
            RemoteError::Conflict { path, .. } => ProviderError::RemoteConflict(path),
            RemoteError::Io(io) => ProviderError::LocalIo(io),
            other => ProviderError::Remote(other.to_string()),
        }
    }
}
