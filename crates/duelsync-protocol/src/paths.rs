//! Store path construction.
//!
//! Every path into the shared tree is built here so the layout lives in
//! one place. Paths are `/`-separated; segments never contain `/`.
//!
//! ```text
//! matchmaking/{entryId}              → QueueEntry
//! pairings/{a}--{b}                  → pairing claim slot (sorted entry ids)
//! rooms/{roomId}/players/{playerId}  → PlayerEntry
//! rooms/{roomId}/playerCards/{playerId}
//! rooms/{roomId}/roundData/{playerId}_selection
//! rooms/{roomId}/roundData/resolver  → resolver claim slot (round number)
//! rooms/{roomId}/roundData/verdict   → RoundVerdict
//! rooms/{roomId}/gameState           → GameState
//! stats/{playerId}/{counter}         → atomic counters
//! ```

use crate::{EntryId, PlayerId, RoomId};

/// Root of the matchmaking queue.
pub const MATCHMAKING: &str = "matchmaking";

/// Root of all game rooms.
pub const ROOMS: &str = "rooms";

pub fn queue_entry(entry: &EntryId) -> String {
    format!("{MATCHMAKING}/{entry}")
}

/// Claim slot for pairing two queue entries into a room. The ids are
/// sorted so both racing clients produce the same path.
pub fn pairing(a: &EntryId, b: &EntryId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("pairings/{lo}--{hi}")
}

pub fn room(room: &RoomId) -> String {
    format!("{ROOMS}/{room}")
}

pub fn players(room: &RoomId) -> String {
    format!("{ROOMS}/{room}/players")
}

pub fn player(room: &RoomId, player: &PlayerId) -> String {
    format!("{ROOMS}/{room}/players/{player}")
}

pub fn player_score(room: &RoomId, player: &PlayerId) -> String {
    format!("{ROOMS}/{room}/players/{player}/score")
}

pub fn player_cards(room: &RoomId, player: &PlayerId) -> String {
    format!("{ROOMS}/{room}/playerCards/{player}")
}

pub fn round_data(room: &RoomId) -> String {
    format!("{ROOMS}/{room}/roundData")
}

pub fn selection(room: &RoomId, player: &PlayerId) -> String {
    format!("{ROOMS}/{room}/roundData/{player}_selection")
}

pub fn resolver(room: &RoomId) -> String {
    format!("{ROOMS}/{room}/roundData/resolver")
}

pub fn verdict(room: &RoomId) -> String {
    format!("{ROOMS}/{room}/roundData/verdict")
}

pub fn game_state(room: &RoomId) -> String {
    format!("{ROOMS}/{room}/gameState")
}

pub fn stat(player: &PlayerId, counter: &str) -> String {
    format!("stats/{player}/{counter}")
}

/// Key of a player's selection inside the `roundData` map.
pub fn selection_key(player: &PlayerId) -> String {
    format!("{player}_selection")
}

/// Inverse of [`selection_key`]: extracts the player id from a
/// `roundData` key, or `None` for the non-selection slots
/// (`resolver`, `verdict`).
pub fn player_of_selection_key(key: &str) -> Option<PlayerId> {
    key.strip_suffix("_selection").map(PlayerId::new)
}
