//! Core record types shared through the store.
//!
//! Field names follow the store tree's wire shape (camelCase where the
//! original tree uses it, e.g. `hasSelected`), verified by the shape
//! tests below. Changing a rename here is a protocol change — the
//! opponent's client will stop understanding our writes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player, as issued by the identity boundary.
///
/// Opaque string newtype. Its byte-lexicographic ordering is the
/// canonical player ordering — both clients must feed the arbiter the
/// same (first, second) card pair, so "first" always means the card of
/// the lexically smaller id, no matter which side evaluates it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a game room. Assigned by the store when the
/// room record is pushed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a matchmaking queue entry (a push id).
///
/// Push ids sort in creation order, which the pairing step relies on as
/// a tiebreak when two entries carry the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated player as handed over by the identity boundary.
/// Immutable for the session; the core performs no authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub display_name: String,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            display_name: display_name.into(),
        }
    }
}

/// Orders two player ids into the canonical (first, second) pair.
///
/// Deterministic and symmetric: both clients get the same answer
/// regardless of argument order, which keeps arbitration inputs
/// identical on both sides.
pub fn ordered_players<'a>(a: &'a PlayerId, b: &'a PlayerId) -> (&'a PlayerId, &'a PlayerId) {
    if a <= b { (a, b) } else { (b, a) }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// One character card as drawn from the catalog.
///
/// `id` is a string because real catalog ids and fallback ids
/// (`fallback_0`, `fallback_1`, …) share the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub image: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Store records
// ---------------------------------------------------------------------------

/// A waiting player in the matchmaking queue, at `matchmaking/{entryId}`.
///
/// Created when matchmaking starts; destroyed on pairing, timeout, or
/// disconnect (auto-removal is registered at creation time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub enqueued_at_ms: u64,
}

/// A player's slot in a room, at `rooms/{roomId}/players/{playerId}`.
///
/// `score` is in half-point units (2 = one point) so both the win
/// increment and the tie increment go through the store's atomic
/// integer increment. Monotonically non-decreasing for the life of the
/// room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub display_name: String,
    #[serde(default)]
    pub score: u32,
}

/// A secret pick for the current round, at
/// `rooms/{roomId}/roundData/{playerId}_selection`.
///
/// Only meaningful while `gameState.currentRound` is unchanged since it
/// was written; cleared before every round advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub has_selected: bool,
    pub card: Character,
    pub timestamp_ms: u64,
}

/// Whether the match is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Finished,
}

/// The final outcome of a match: a specific player, or a dead heat.
///
/// Serialized as the winner's id, or the literal string `"tie"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchWinner {
    Tie,
    #[serde(untagged)]
    Player(PlayerId),
}

/// Room-level game state, at `rooms/{roomId}/gameState`.
///
/// `timer` is informational only (seconds the UI counts down from);
/// no protocol decision depends on it. `winner` is set exactly when
/// `status` becomes [`GameStatus::Finished`] and never changes after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_round: u32,
    pub timer: u32,
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<MatchWinner>,
}

/// The committed outcome of one round, at `rooms/{roomId}/roundData/verdict`.
///
/// Written exactly once per round, by the client that won the resolver
/// claim. `winner: None` means a tie (both sides scored half a point).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundVerdict {
    pub round: u32,
    pub winner: Option<PlayerId>,
    pub explanation: String,
}

// ---------------------------------------------------------------------------
// Local views (never written to the store)
// ---------------------------------------------------------------------------

/// A round's outcome from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Win,
    Lose,
    Tie,
}

/// What one player shows for a resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub round: u32,
    pub self_card: Character,
    pub opponent_card: Character,
    pub outcome: RoundOutcome,
    pub explanation: String,
}

/// Both totals from one player's point of view, in half-points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreView {
    pub own: u32,
    pub opponent: u32,
}

impl ScoreView {
    /// Own total in whole points.
    pub fn own_points(&self) -> f64 {
        f64::from(self.own) / f64::from(crate::HALF_POINTS_PER_POINT)
    }

    /// Opponent total in whole points.
    pub fn opponent_points(&self) -> f64 {
        f64::from(self.opponent) / f64::from(crate::HALF_POINTS_PER_POINT)
    }
}

// =========================================================================
// Tests
// =========================================================================
