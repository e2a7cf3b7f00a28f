//! Room state: parsing observed snapshots, the local phase machine,
//! and the room-level operations (deal, advance, leave).

use std::collections::BTreeMap;

use duelsync_catalog::{Catalog, CharacterFetcher};
use duelsync_protocol::{
    paths, Character, GameState, GameStatus, PlayerEntry, PlayerId, PlayerIdentity, RoomId,
    RoundVerdict, Selection,
};
use duelsync_store::SharedStore;
use serde::Deserialize;
use serde_json::Value;

use crate::{ClientError, GameConfig};

// ---------------------------------------------------------------------------
// Local phase machine
// ---------------------------------------------------------------------------

/// One client's view of where its match stands.
///
/// ```text
/// AwaitingCards → RoundActive → RoundResolved → RoundActive
///                                        └────→ Finished
/// ```
///
/// This is purely local bookkeeping — the shared source of truth is the
/// room record. `Finished` is terminal and entered only on observing
/// the committed win-condition write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    AwaitingCards,
    RoundActive,
    RoundResolved,
    Finished,
}

impl RoomPhase {
    /// Returns `true` if moving to `next` is a legal phase transition.
    pub fn may_enter(self, next: RoomPhase) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingCards, Self::RoundActive)
                | (Self::RoundActive, Self::RoundResolved)
                | (Self::RoundResolved, Self::RoundActive)
                | (Self::RoundResolved, Self::Finished)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

// ---------------------------------------------------------------------------
// Snapshot parsing
// ---------------------------------------------------------------------------

/// Serde shape of the raw room record. `roundData` is a loose map
/// because selection keys embed player ids.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoom {
    #[serde(default)]
    players: BTreeMap<String, PlayerEntry>,
    #[serde(default)]
    player_cards: BTreeMap<String, Vec<Character>>,
    #[serde(default)]
    round_data: BTreeMap<String, Value>,
    game_state: Option<GameState>,
}

/// A parsed point-in-time view of one room.
///
/// Parsed fresh from every notification; the protocol re-evaluates all
/// of its predicates against the newest snapshot rather than trusting
/// any earlier observation.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub players: BTreeMap<PlayerId, PlayerEntry>,
    pub player_cards: BTreeMap<PlayerId, Vec<Character>>,
    pub selections: BTreeMap<PlayerId, Selection>,
    /// Round number claimed by this round's elected resolver, if any.
    pub resolver: Option<u32>,
    pub verdict: Option<RoundVerdict>,
    pub game_state: GameState,
}

impl RoomSnapshot {
    pub fn parse(id: &RoomId, value: &Value) -> Result<Self, ClientError> {
        let path = paths::room(id);
        let raw: RawRoom =
            serde_json::from_value(value.clone()).map_err(ClientError::malformed(&*path))?;

        let mut selections = BTreeMap::new();
        let mut resolver = None;
        let mut verdict = None;
        for (key, value) in raw.round_data {
            if key == "resolver" {
                resolver = value.as_u64().map(|n| n as u32);
            } else if key == "verdict" {
                verdict = Some(
                    serde_json::from_value(value)
                        .map_err(ClientError::malformed(paths::verdict(id)))?,
                );
            } else if let Some(player) = paths::player_of_selection_key(&key) {
                let selection: Selection = serde_json::from_value(value)
                    .map_err(ClientError::malformed(paths::selection(id, &player)))?;
                selections.insert(player, selection);
            }
        }

        Ok(Self {
            id: id.clone(),
            players: raw
                .players
                .into_iter()
                .map(|(k, v)| (PlayerId::new(k), v))
                .collect(),
            player_cards: raw
                .player_cards
                .into_iter()
                .map(|(k, v)| (PlayerId::new(k), v))
                .collect(),
            selections,
            resolver,
            verdict,
            game_state: raw.game_state.unwrap_or(GameState {
                current_round: 1,
                timer: 0,
                status: GameStatus::InProgress,
                winner: None,
            }),
        })
    }

    /// The other player's id, once both slots exist.
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        self.players.keys().find(|id| *id != player)
    }

    /// Half-point total for a player (0 if the slot is missing).
    pub fn score_of(&self, player: &PlayerId) -> u32 {
        self.players.get(player).map(|p| p.score).unwrap_or(0)
    }

    /// The dual-completion predicate: every player in the room has a
    /// live selection for the current round.
    pub fn all_selected(&self) -> bool {
        !self.players.is_empty()
            && self.players.keys().all(|id| {
                self.selections
                    .get(id)
                    .map(|s| s.has_selected)
                    .unwrap_or(false)
            })
    }
}

// ---------------------------------------------------------------------------
// Room operations
// ---------------------------------------------------------------------------

/// Deals this player's hand into the room. Called once when joining;
/// the hand is fixed for the whole match.
pub(crate) async fn initialize_room<S: SharedStore, F: CharacterFetcher>(
    store: &S,
    catalog: &Catalog<F>,
    config: &GameConfig,
    player: &PlayerIdentity,
    room_id: &RoomId,
) -> Result<Vec<Character>, ClientError> {
    let cards = catalog.fetch_characters(config.hand_size).await;
    let path = paths::player_cards(room_id, &player.id);
    let value = serde_json::to_value(&cards).map_err(ClientError::malformed(&*path))?;
    store.write(&path, value).await?;
    tracing::info!(%room_id, player_id = %player.id, cards = cards.len(), "hand dealt");
    Ok(cards)
}

/// Moves the room to the next round: stale selections (and the
/// previous verdict and resolver claim) are cleared *before* the new
/// round number appears, so no observer can mistake old round data for
/// fresh.
pub(crate) async fn advance_round<S: SharedStore>(
    store: &S,
    config: &GameConfig,
    room_id: &RoomId,
    next_round: u32,
) -> Result<(), ClientError> {
    store.remove(&paths::round_data(room_id)).await?;

    let state = GameState {
        current_round: next_round,
        timer: config.round_timer_secs,
        status: GameStatus::InProgress,
        winner: None,
    };
    let path = paths::game_state(room_id);
    let value = serde_json::to_value(&state).map_err(ClientError::malformed(&*path))?;
    store.write(&path, value).await?;
    tracing::info!(%room_id, round = next_round, "round advanced");
    Ok(())
}

/// Removes only our own player slot. The opponent's entry is never
/// force-deleted; their client observes the shrink and treats the room
/// as abandoned.
pub(crate) async fn leave_room<S: SharedStore>(
    store: &S,
    room_id: &RoomId,
    player: &PlayerId,
) -> Result<(), ClientError> {
    store.remove(&paths::player(room_id, player)).await?;
    tracing::info!(%room_id, player_id = %player, "left room");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_transitions() {
        use RoomPhase::*;
        assert!(AwaitingCards.may_enter(RoundActive));
        assert!(RoundActive.may_enter(RoundResolved));
        assert!(RoundResolved.may_enter(RoundActive));
        assert!(RoundResolved.may_enter(Finished));

        assert!(!AwaitingCards.may_enter(Finished));
        assert!(!RoundActive.may_enter(RoundActive));
        assert!(!Finished.may_enter(RoundActive));
        assert!(Finished.is_terminal());
    }

    #[test]
    fn test_parse_full_room() {
        let room_id = RoomId::new("r1");
        let value = json!({
            "players": {
                "alice": {"displayName": "Alice", "score": 2},
                "bob": {"displayName": "Bob"},
            },
            "playerCards": {
                "alice": [{"id": "1", "name": "Goku", "image": "i", "description": "d"}],
            },
            "roundData": {
                "alice_selection": {
                    "hasSelected": true,
                    "card": {"id": "1", "name": "Goku", "image": "i", "description": "d"},
                    "timestampMs": 9,
                },
                "resolver": 2,
            },
            "gameState": {"currentRound": 2, "timer": 20, "status": "in_progress"},
        });

        let snap = RoomSnapshot::parse(&room_id, &value).unwrap();
        assert_eq!(snap.players.len(), 2);
        assert_eq!(snap.score_of(&PlayerId::new("alice")), 2);
        assert_eq!(snap.score_of(&PlayerId::new("bob")), 0);
        assert_eq!(snap.resolver, Some(2));
        assert!(snap.verdict.is_none());
        assert_eq!(snap.game_state.current_round, 2);
        assert!(!snap.all_selected(), "bob has not selected yet");
        assert_eq!(
            snap.opponent_of(&PlayerId::new("alice")),
            Some(&PlayerId::new("bob"))
        );
    }

    #[test]
    fn test_parse_minimal_room_defaults() {
        let room_id = RoomId::new("r1");
        let snap = RoomSnapshot::parse(&room_id, &json!({"players": {}})).unwrap();
        assert_eq!(snap.game_state.current_round, 1);
        assert!(!snap.all_selected(), "empty room never counts as all-selected");
    }

    #[test]
    fn test_parse_rejects_malformed_selection() {
        let room_id = RoomId::new("r1");
        let value = json!({
            "players": {},
            "roundData": {"alice_selection": {"hasSelected": "yes"}},
        });
        let err = RoomSnapshot::parse(&room_id, &value).unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
    }
}
