//! Error types for the RPC transport.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the RPC transport.
///
/// Retryability is decided on the variant, never on exception class or
/// string matching: only `RateLimited` (per policy) and `AuthExpired`
/// (exactly once, after a refresh) are ever retried automatically.
#[derive(Debug, Error)]
pub enum RpcError {
    // Request construction
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    // Response parsing
    #[error("Decoding error: {message}")]
    Decoding { message: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    // Session errors
    #[error("Authentication expired: {message}")]
    AuthExpired { message: String },

    #[error("Re-login required: {message}")]
    ReloginRequired { message: String },

    // Application errors
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    /// The response never contained the requested method id. Usually means
    /// the remote service renamed the method (protocol drift).
    #[error("RPC method {name} ({id}) missing from response")]
    UnknownRpcMethod { id: String, name: String },
}

impl RpcError {
    /// Whether the retry policy may act on this error at all.
    ///
    /// `Network` and `Timeout` are deliberately excluded: the request may
    /// have reached the server, and replaying it is a caller decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::RateLimited { .. } | RpcError::AuthExpired { .. }
        )
    }

    /// Whether this error invalidates the current credential set.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            RpcError::AuthExpired { .. } | RpcError::ReloginRequired { .. }
        )
    }
}

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;
