//! Error types for the protocol layer.
//!
//! Nothing here is fatal to the process: coordination timeouts and
//! abandoned rooms are recoverable conditions the caller surfaces to
//! the user, and store failures are surfaced without rolling back
//! optimistic local state. External-collaborator failures (catalog,
//! judge) never reach this enum — they degrade inside their own crates.

use duelsync_protocol::RoomId;
use duelsync_store::StoreError;

/// Errors that can occur while coordinating a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Nobody was paired with us inside the matchmaking window.
    /// Recoverable: the caller may retry.
    #[error("no opponent found")]
    NoOpponentFound,

    /// The room disappeared or the opponent left mid-match. The local
    /// client returns to idle.
    #[error("room {0} is gone or was abandoned")]
    RoomAbandoned(RoomId),

    /// A selection referenced a card index outside the hand.
    #[error("no card at index {0}")]
    InvalidCardIndex(usize),

    /// A store operation failed.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// A record in the store did not parse as its expected shape.
    #[error("malformed record at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Helper for wrapping serde failures with the offending path.
    pub(crate) fn malformed(path: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| Self::Malformed { path, source }
    }
}
