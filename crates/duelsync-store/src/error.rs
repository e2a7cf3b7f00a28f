//! Error types for the store layer.

/// Errors that can occur during store operations.
///
/// Any operation may fail independently; the protocol layer decides
/// per call whether a failure degrades, retries implicitly on the next
/// notification, or surfaces to the user.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached right now.
    #[error("store unavailable")]
    Unavailable,

    /// An empty path or empty path segment was passed.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// `atomic_increment` targeted a value that is not an integer.
    #[error("value at {0} is not an integer")]
    NotAnInteger(String),
}
