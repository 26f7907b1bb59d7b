//! Error types for remote store operations.

use thiserror::Error;

/// Error type for a single remote store call.
///
/// Distinguishes network-shaped failures (worth retrying) from internal
/// state or encoding problems.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with the remote store.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send>),

    /// The stored bytes could not be interpreted as a document.
    #[error("format error: {0}")]
    FormatError(#[from] serde_json::Error),
}
