//! Score accounting and the win condition.
//!
//! Scores are stored as half-points (`u32`) so a tie can award each
//! player half a point through the same atomic-increment path a win
//! uses. Display code converts back to points via
//! [`duelsync_protocol::HALF_POINTS_PER_POINT`].

use std::collections::BTreeMap;

use duelsync_protocol::{MatchWinner, PlayerId, ScoreView};

use crate::room::RoomSnapshot;

/// Evaluates the win condition over committed half-point totals.
///
/// Returns `None` while nobody has reached the threshold. When at least
/// one player has, the higher total wins; equal totals at or above the
/// threshold are a drawn match.
pub fn completion(totals: &BTreeMap<PlayerId, u32>, threshold: u32) -> Option<MatchWinner> {
    let max = totals.values().copied().max()?;
    if max < threshold {
        return None;
    }
    let mut leaders = totals.iter().filter(|(_, score)| **score == max);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        Some(MatchWinner::Tie)
    } else {
        Some(MatchWinner::Player(leader.clone()))
    }
}

/// This player's view of the standings in a snapshot.
pub fn score_view(snap: &RoomSnapshot, player: &PlayerId) -> ScoreView {
    let opponent = snap
        .opponent_of(player)
        .map(|id| snap.score_of(id))
        .unwrap_or(0);
    ScoreView {
        own: snap.score_of(player),
        opponent,
    }
}
