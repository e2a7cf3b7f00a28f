//! Duelsync core protocol: the logic one client runs for a match.
//!
//! There is no central game server. Both clients run this exact code
//! against the shared store: each observes the room subtree, and each
//! independently writes its conclusions. Correctness under two
//! uncoordinated writers comes from three things:
//!
//! 1. **Convergent full-record writes** — records are replaced whole,
//!    never patched field by field, so last-write-wins stays coherent.
//! 2. **Claims** — any step that must happen exactly once per pair or
//!    per round (room creation, round resolution) is gated by a
//!    vacant-slot compare-and-set; the claim loser just observes.
//! 3. **Atomic increments** — scores move in half-point integer units
//!    through the store's increment primitive, never read-then-write.
//!
//! # Key types
//!
//! - [`GameClient`] — one player's session facade
//! - [`GameEvent`] — what the UI layer consumes
//! - [`Matchmaker`] — queue entry, pairing, room creation
//! - [`RoomSnapshot`] / [`RoomPhase`] — the observed room and the local
//!   phase machine
//! - [`GameConfig`] — timing windows and thresholds

mod client;
mod config;
mod error;
mod matchmaking;
mod room;
mod round;
mod score;

pub use client::{GameClient, GameEvent};
pub use config::GameConfig;
pub use error::ClientError;
pub use matchmaking::Matchmaker;
pub use room::{RoomPhase, RoomSnapshot};
pub use round::{submit_selection, try_resolve, ResolveOutcome};
pub use score::{completion, score_view};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, for record timestamps.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
