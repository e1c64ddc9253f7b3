//! Error types for the session layer.

/// Errors that can occur while storing or loading a session.
///
/// A missing or expired session is not an error; loads return `None`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing storage could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// The stored session could not be encoded or decoded.
    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
