//! The session facade one player runs: matchmaking, the per-room event
//! loop, and stat recording.

use std::future::pending;
use std::pin::Pin;

use duelsync_arbiter::{Arbiter, Judge};
use duelsync_catalog::{Catalog, CharacterFetcher};
use duelsync_protocol::{
    paths, Character, GameStatus, MatchWinner, PlayerIdentity, RoomId, RoundResult, ScoreView,
};
use duelsync_store::SharedStore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, Sleep};

use crate::matchmaking::Matchmaker;
use crate::room::{self, RoomPhase, RoomSnapshot};
use crate::round::{self, ResolveOutcome};
use crate::score::score_view;
use crate::{ClientError, GameConfig};

/// What the presentation layer consumes. Events describe observed
/// protocol progress; they carry no store paths or raw records.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// Paired into a room; the match is about to start.
    MatchFound { room_id: RoomId },

    /// This player's hand for the whole match.
    HandDealt(Vec<Character>),

    /// A new round is active and awaiting selections.
    RoundStarted { round: u32 },

    /// The opponent has locked in a pick (the pick itself stays secret).
    OpponentSelected,

    /// Committed half-point totals changed.
    ScoreChanged(ScoreView),

    /// A round was judged; shown for `result_display_delay` before the
    /// next round starts.
    RoundResolved(RoundResult),

    /// The opponent's slot disappeared mid-match.
    OpponentLeft,

    /// The win condition was reached.
    GameFinished { winner: MatchWinner },
}

/// One player's session. Both players of a match run an identical
/// `GameClient` against the same store; nothing here is leader-only
/// except what a claim makes so at runtime.
pub struct GameClient<S, F, J> {
    store: S,
    catalog: Catalog<F>,
    arbiter: Arbiter<J>,
    identity: PlayerIdentity,
    config: GameConfig,
    events: UnboundedSender<GameEvent>,
}

impl<S, F, J> GameClient<S, F, J>
where
    S: SharedStore,
    F: CharacterFetcher,
    J: Judge,
{
    /// Builds a client and the event stream its session feeds.
    pub fn new(
        store: S,
        catalog: Catalog<F>,
        arbiter: Arbiter<J>,
        identity: PlayerIdentity,
    ) -> (Self, UnboundedReceiver<GameEvent>) {
        Self::with_config(store, catalog, arbiter, identity, GameConfig::default())
    }

    pub fn with_config(
        store: S,
        catalog: Catalog<F>,
        arbiter: Arbiter<J>,
        identity: PlayerIdentity,
        config: GameConfig,
    ) -> (Self, UnboundedReceiver<GameEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                catalog,
                arbiter,
                identity,
                config,
                events,
            },
            rx,
        )
    }

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Queues for a match and returns the paired room.
    pub async fn find_match(&self) -> Result<RoomId, ClientError> {
        let room_id = Matchmaker::new(&self.store, &self.identity, &self.config)
            .find_match()
            .await?;
        self.emit(GameEvent::MatchFound {
            room_id: room_id.clone(),
        });
        Ok(room_id)
    }

    /// Waits out the rematch pause and queues again.
    pub async fn play_again(&self) -> Result<RoomId, ClientError> {
        sleep(self.config.rematch_pause).await;
        self.find_match().await
    }

    /// Runs one full match inside `room_id` until the win condition or
    /// abandonment. Emits [`GameEvent`]s along the way and returns the
    /// final winner.
    pub async fn run_match(&self, room_id: &RoomId) -> Result<MatchWinner, ClientError> {
        // A dropped connection must not strand the opponent against a
        // ghost: our own slot auto-clears, and their client observes
        // the shrink as abandonment.
        self.store
            .on_disconnect_remove(&paths::player(room_id, &self.identity.id))
            .await?;

        let hand = room::initialize_room(
            &self.store,
            &self.catalog,
            &self.config,
            &self.identity,
            room_id,
        )
        .await?;
        self.emit(GameEvent::HandDealt(hand));

        let mut sub = self.store.subscribe(&paths::room(room_id));

        let mut phase = RoomPhase::AwaitingCards;
        let mut last_round: u32 = 0;
        let mut opponent_selected_seen = false;
        let mut verdict_emitted_for: Option<u32> = None;
        let mut last_scores: Option<ScoreView> = None;
        // Set only by the elected resolver after a non-final verdict:
        // the target round plus the display-delay timer that gates it.
        let mut pending_advance: Option<(u32, Pin<Box<Sleep>>)> = None;

        loop {
            tokio::select! {
                _ = async {
                    match pending_advance.as_mut() {
                        Some((_, timer)) => timer.as_mut().await,
                        None => pending().await,
                    }
                } => {
                    if let Some((next_round, _)) = pending_advance.take() {
                        room::advance_round(&self.store, &self.config, room_id, next_round)
                            .await?;
                    }
                }

                snapshot = sub.next() => {
                    let Some(snapshot) = snapshot else {
                        return Err(duelsync_store::StoreError::Unavailable.into());
                    };
                    let Some(value) = snapshot else {
                        self.emit(GameEvent::OpponentLeft);
                        return Err(ClientError::RoomAbandoned(room_id.clone()));
                    };
                    let snap = match RoomSnapshot::parse(room_id, &value) {
                        Ok(snap) => snap,
                        Err(err) => {
                            tracing::warn!(%room_id, %err, "unparseable room snapshot, waiting for the next");
                            continue;
                        }
                    };

                    let round = snap.game_state.current_round;

                    if round != last_round {
                        last_round = round;
                        opponent_selected_seen = false;
                        if pending_advance
                            .as_ref()
                            .is_some_and(|(target, _)| round >= *target)
                        {
                            pending_advance = None;
                        }
                        phase = self.transition(room_id, phase, RoomPhase::RoundActive);
                        self.emit(GameEvent::RoundStarted { round });
                    }

                    let scores = score_view(&snap, &self.identity.id);
                    if last_scores != Some(scores) {
                        last_scores = Some(scores);
                        self.emit(GameEvent::ScoreChanged(scores));
                    }

                    if !opponent_selected_seen
                        && snap
                            .opponent_of(&self.identity.id)
                            .and_then(|id| snap.selections.get(id))
                            .is_some_and(|s| s.has_selected)
                    {
                        opponent_selected_seen = true;
                        self.emit(GameEvent::OpponentSelected);
                    }

                    if let Some(verdict) = &snap.verdict {
                        if verdict.round == round && verdict_emitted_for != Some(round) {
                            verdict_emitted_for = Some(round);
                            phase = self.transition(room_id, phase, RoomPhase::RoundResolved);
                            if let Some(result) =
                                round::result_for(&self.identity.id, &snap, verdict)
                            {
                                self.emit(GameEvent::RoundResolved(result));
                            }
                        }
                    }

                    if snap.game_state.status == GameStatus::Finished {
                        if let Some(winner) = snap.game_state.winner.clone() {
                            self.transition(room_id, phase, RoomPhase::Finished);
                            self.emit(GameEvent::GameFinished {
                                winner: winner.clone(),
                            });
                            self.record_stats(&snap).await;
                            // Vacate our slot so this room can never be
                            // mistaken for a live pairing later.
                            if let Err(err) =
                                room::leave_room(&self.store, room_id, &self.identity.id).await
                            {
                                tracing::warn!(%room_id, %err, "failed to vacate finished room");
                            }
                            return Ok(winner);
                        }
                    }

                    if !snap.players.contains_key(&self.identity.id)
                        || snap.players.len() < 2
                    {
                        self.emit(GameEvent::OpponentLeft);
                        return Err(ClientError::RoomAbandoned(room_id.clone()));
                    }

                    if snap.all_selected() && snap.verdict.is_none() && snap.resolver.is_none() {
                        match round::try_resolve(&self.store, &self.arbiter, &self.config, &snap)
                            .await?
                        {
                            ResolveOutcome::Resolved { finished: None, .. } => {
                                pending_advance = Some((
                                    round + 1,
                                    Box::pin(sleep(self.config.result_display_delay)),
                                ));
                            }
                            // A finished match surfaces through the
                            // gameState write we just made; the next
                            // notification handles it like any other.
                            ResolveOutcome::Resolved { .. } | ResolveOutcome::NotElected => {}
                        }
                    }
                }
            }
        }
    }

    /// Locks in this player's pick for the current round. Returns
    /// `false` if a pick for the round was already submitted.
    pub async fn submit_selection(
        &self,
        room_id: &RoomId,
        hand: &[Character],
        card_index: usize,
    ) -> Result<bool, ClientError> {
        round::submit_selection(&self.store, room_id, &self.identity.id, hand, card_index).await
    }

    /// Leaves the room voluntarily. Only our own slot is removed.
    pub async fn leave(&self, room_id: &RoomId) -> Result<(), ClientError> {
        room::leave_room(&self.store, room_id, &self.identity.id).await
    }

    /// Bumps the lifetime counters after a finished match. A drawn
    /// match counts as a loss. Stat writes are best effort — a failure
    /// never fails the match that just completed.
    async fn record_stats(&self, snap: &RoomSnapshot) {
        let scores = score_view(snap, &self.identity.id);
        let outcome = if scores.own > scores.opponent {
            "wins"
        } else {
            "losses"
        };
        for counter in ["totalGames", outcome] {
            let path = paths::stat(&self.identity.id, counter);
            if let Err(err) = self.store.atomic_increment(&path, 1).await {
                tracing::warn!(player_id = %self.identity.id, counter, %err, "stat update failed");
            }
        }
    }

    /// Advances the local phase machine, flagging transitions the
    /// machine does not expect (a missed notification, usually).
    fn transition(&self, room_id: &RoomId, from: RoomPhase, to: RoomPhase) -> RoomPhase {
        if !from.may_enter(to) {
            tracing::debug!(%room_id, ?from, ?to, "irregular phase transition");
        }
        to
    }

    fn emit(&self, event: GameEvent) {
        // A dropped receiver means nobody is rendering; the protocol
        // keeps running regardless.
        let _ = self.events.send(event);
    }
}
