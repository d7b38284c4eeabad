//! Error types for the client engine.

use memodeck_protocol::{ConflictRejection, ConflictReport, ProtocolError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while syncing.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Wire-format failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Credential rejected by the server.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Push rejected on version conflict. The outbox is untouched; the
    /// caller pulls, merges, and resubmits.
    #[error("push rejected: {} conflicting entities", .0.conflicts.len())]
    Conflict(ConflictRejection),

    /// Server rejected the request as invalid.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Server-side failure.
    #[error("server error: {0}")]
    Server(String),

    /// A sync cycle is already running on this engine.
    #[error("a sync is already in flight")]
    SyncInFlight,

    /// The pull loop hit its page bound before draining the server.
    /// Progress up to the bound is persisted; the next sync resumes there.
    #[error("pull stopped after {pages} pages with more remaining")]
    PageLimitExceeded {
        /// Pages consumed before stopping.
        pages: u32,
    },
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a retry may succeed. Conflicts are never retryable;
    /// they need a pull and a merge first.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server(_) => true,
            _ => false,
        }
    }

    /// Returns true for a version-conflict rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(_))
    }

    /// Returns the conflict list, if this is a conflict rejection.
    pub fn conflicts(&self) -> Option<&[ConflictReport]> {
        match self {
            ClientError::Conflict(rejection) => Some(&rejection.conflicts),
            _ => None,
        }
    }
}
