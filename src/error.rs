//! Error types for topic-sync.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`SyncError::code()`].
//! Rate limiting and short-title rejections never show up here: the retry
//! executor absorbs them.

use crate::publish::{PublishRequest, RemoteFailure};

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The event source could not produce an event list.
    pub const SOURCE_FETCH_FAILED: &str = "SOURCE_FETCH_FAILED";

    /// A remote mutation failed in a way that cannot be retried.
    pub const REMOTE_FAILED: &str = "REMOTE_FAILED";

    /// Rate-limit backoff ran out of attempts or time.
    pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";

    /// The correlation store could not be read or written.
    pub const STORE_FAILED: &str = "STORE_FAILED";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Any other I/O failure.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Errors that abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The event source failed; nothing has been mutated yet.
    #[error("[{}] {}", error_codes::SOURCE_FETCH_FAILED, .0)]
    SourceFetch(String),

    /// Unclassified remote failure: any status other than rate limiting or a
    /// fixable validation error, or a transport failure with no response.
    #[error("[{}] {} failed: {}", error_codes::REMOTE_FAILED, .request, .failure)]
    Remote {
        /// The request as it was last sent.
        request: PublishRequest,
        /// What the remote side answered.
        failure: RemoteFailure,
    },

    /// The request stayed rate limited past the attempt cap or deadline.
    #[error(
        "[{}] {} still rate limited after {} attempts",
        error_codes::RETRY_EXHAUSTED,
        .request,
        .attempts
    )]
    RetryExhausted {
        /// The request as it was last sent.
        request: PublishRequest,
        /// Number of rate-limited responses received.
        attempts: u32,
    },

    /// Correlation store read, decode or write failure.
    #[error("[{}] {}", error_codes::STORE_FAILED, .0)]
    Store(String),

    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceFetch(_) => error_codes::SOURCE_FETCH_FAILED,
            Self::Remote { .. } => error_codes::REMOTE_FAILED,
            Self::RetryExhausted { .. } => error_codes::RETRY_EXHAUSTED,
            Self::Store(_) => error_codes::STORE_FAILED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// The offending request, for errors raised by a remote mutation.
    pub fn request(&self) -> Option<&PublishRequest> {
        match self {
            Self::Remote { request, .. } | Self::RetryExhausted { request, .. } => Some(request),
            _ => None,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SyncError>;
