//! Shared vocabulary for Duelsync.
//!
//! Both clients in a match read each other's writes out of the shared
//! store, so every record defined here is part of the coordination
//! contract — field names and JSON shapes included. Keep the serde
//! attributes in sync with the shape tests at the bottom of each module.
//!
//! # Key types
//!
//! - [`PlayerId`], [`RoomId`], [`EntryId`] — opaque identity newtypes
//! - [`Character`] — one drawn card
//! - [`QueueEntry`], [`PlayerEntry`], [`Selection`], [`GameState`],
//!   [`RoundVerdict`] — the records that live in the store tree
//! - [`RoundResult`], [`ScoreView`] — per-player views derived locally
//! - [`paths`] — store path construction, all in one place

mod types;

pub mod paths;

pub use types::{
    ordered_players, Character, EntryId, GameState, GameStatus, MatchWinner, PlayerEntry,
    PlayerId, PlayerIdentity, QueueEntry, RoomId, RoundOutcome, RoundResult, RoundVerdict,
    ScoreView, Selection,
};

/// Half-point units per whole point. Scores are stored in half-points
/// so a tie (+0.5) and a win (+1) are both integral increments.
pub const HALF_POINTS_PER_POINT: u32 = 2;
