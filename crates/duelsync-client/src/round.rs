//! Round resolution: selection submission, resolver election,
//! arbitration, and the score commit.
//!
//! Both clients observe the same dual-completion predicate and both may
//! react to it for the same round. The `roundData/resolver` claim turns
//! that race into an election: exactly one client judges the pair,
//! commits the score delta, and writes the verdict; the other observes
//! the verdict like any other change.

use duelsync_arbiter::{Arbiter, Judge, Outcome};
use duelsync_protocol::{
    paths, Character, GameState, GameStatus, MatchWinner, PlayerId, RoundOutcome, RoundResult,
    RoundVerdict, Selection,
};
use duelsync_store::SharedStore;
use serde_json::json;
use std::collections::BTreeMap;

use crate::room::RoomSnapshot;
use crate::score::completion;
use crate::{now_ms, ClientError, GameConfig};

/// What one client's resolution attempt produced.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// Another client won the resolver claim for this round; nothing to
    /// do but wait for its verdict.
    NotElected,

    /// This client resolved the round. `finished` carries the final
    /// winner when the score commit crossed the win threshold.
    Resolved {
        verdict: RoundVerdict,
        finished: Option<MatchWinner>,
    },
}

/// Writes this player's secret pick for the current round.
///
/// Returns `false` (a no-op) if a selection for this round already
/// exists — a player submits at most once per round, and re-submission
/// before the round advances is rejected here rather than trusted to
/// the UI.
pub async fn submit_selection<S: SharedStore>(
    store: &S,
    room_id: &duelsync_protocol::RoomId,
    player: &PlayerId,
    hand: &[Character],
    card_index: usize,
) -> Result<bool, ClientError> {
    let path = paths::selection(room_id, player);
    if store.read(&path).await?.is_some() {
        tracing::debug!(%room_id, player_id = %player, "already selected this round, ignoring");
        return Ok(false);
    }

    let card = hand
        .get(card_index)
        .ok_or(ClientError::InvalidCardIndex(card_index))?;
    let selection = Selection {
        has_selected: true,
        card: card.clone(),
        timestamp_ms: now_ms(),
    };
    let value = serde_json::to_value(&selection).map_err(ClientError::malformed(&*path))?;
    store.write(&path, value).await?;
    tracing::info!(%room_id, player_id = %player, card = %card.name, "selection submitted");
    Ok(true)
}

/// Runs one resolution attempt for a round whose dual-completion
/// predicate holds (caller checks [`RoomSnapshot::all_selected`]).
///
/// The cards go to the arbiter ordered by ascending player id, so both
/// clients — whichever wins the election — present the identical
/// (first, second) pair and map the outcome to the same winner.
pub async fn try_resolve<S: SharedStore, J: Judge>(
    store: &S,
    arbiter: &Arbiter<J>,
    config: &GameConfig,
    snap: &RoomSnapshot,
) -> Result<ResolveOutcome, ClientError> {
    let round = snap.game_state.current_round;

    if !store
        .claim(&paths::resolver(&snap.id), json!(round))
        .await?
    {
        return Ok(ResolveOutcome::NotElected);
    }
    tracing::debug!(room_id = %snap.id, round, "elected round resolver");

    // BTreeMap keys are already in ascending id order.
    let ids: Vec<&PlayerId> = snap.players.keys().collect();
    let (first, second) = match ids.as_slice() {
        [first, second] => (*first, *second),
        _ => return Err(ClientError::RoomAbandoned(snap.id.clone())),
    };
    let first_card = selected_card(snap, first)?;
    let second_card = selected_card(snap, second)?;

    let judged = arbiter.judge(first_card, second_card).await;
    let winner = match judged.outcome {
        Outcome::First => Some(first.clone()),
        Outcome::Second => Some(second.clone()),
        Outcome::Tie => None,
    };

    // Score commit through atomic increments, never read-then-write:
    // +2 half-points to the winner, +1 to each on a tie.
    let mut totals: BTreeMap<PlayerId, u32> = snap
        .players
        .iter()
        .map(|(id, entry)| (id.clone(), entry.score))
        .collect();
    match &winner {
        Some(player) => {
            let total = store
                .atomic_increment(&paths::player_score(&snap.id, player), 2)
                .await?;
            totals.insert(player.clone(), total.max(0) as u32);
        }
        None => {
            for player in [first, second] {
                let total = store
                    .atomic_increment(&paths::player_score(&snap.id, player), 1)
                    .await?;
                totals.insert(player.clone(), total.max(0) as u32);
            }
        }
    }

    let verdict = RoundVerdict {
        round,
        winner,
        explanation: judged.explanation,
    };
    let verdict_path = paths::verdict(&snap.id);
    let value = serde_json::to_value(&verdict).map_err(ClientError::malformed(&*verdict_path))?;
    store.write(&verdict_path, value).await?;
    tracing::info!(
        room_id = %snap.id,
        round,
        winner = ?verdict.winner,
        "round resolved"
    );

    // Completion check — only the elected resolver ever writes the
    // finished state, so the in_progress → finished transition is
    // committed exactly once.
    let finished = completion(&totals, config.win_threshold);
    if let Some(winner) = &finished {
        let state = GameState {
            current_round: round,
            timer: 0,
            status: GameStatus::Finished,
            winner: Some(winner.clone()),
        };
        let path = paths::game_state(&snap.id);
        let value = serde_json::to_value(&state).map_err(ClientError::malformed(&*path))?;
        store.write(&path, value).await?;
        tracing::info!(room_id = %snap.id, winner = ?winner, "match finished");
    }

    Ok(ResolveOutcome::Resolved { verdict, finished })
}

/// The round result from one player's point of view, built from an
/// observed verdict. `None` if the snapshot no longer carries both
/// selections (e.g. a verdict observed during teardown).
pub(crate) fn result_for(
    player: &PlayerId,
    snap: &RoomSnapshot,
    verdict: &RoundVerdict,
) -> Option<RoundResult> {
    let opponent = snap.opponent_of(player)?;
    let self_card = snap.selections.get(player)?.card.clone();
    let opponent_card = snap.selections.get(opponent)?.card.clone();
    let outcome = match &verdict.winner {
        None => RoundOutcome::Tie,
        Some(winner) if winner == player => RoundOutcome::Win,
        Some(_) => RoundOutcome::Lose,
    };
    Some(RoundResult {
        round: verdict.round,
        self_card,
        opponent_card,
        outcome,
        explanation: verdict.explanation.clone(),
    })
}

fn selected_card<'a>(
    snap: &'a RoomSnapshot,
    player: &PlayerId,
) -> Result<&'a Character, ClientError> {
    snap.selections
        .get(player)
        .filter(|s| s.has_selected)
        .map(|s| &s.card)
        .ok_or_else(|| ClientError::RoomAbandoned(snap.id.clone()))
}
