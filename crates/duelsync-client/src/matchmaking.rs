//! Matchmaking: queue entry, pairing claim, room creation.
//!
//! There is no dedicated matchmaking process. Every waiting client
//! watches the queue, and whichever one first observes two compatible
//! entries tries to pair them. The pairing claim (a vacant-slot
//! compare-and-set keyed by the sorted entry ids) guarantees that the
//! race produces exactly one room per pair: the claim winner creates
//! the room and clears both queue entries, the loser simply keeps
//! waiting until the room shows up on its `rooms` subscription.

use duelsync_protocol::{
    paths, EntryId, GameState, GameStatus, PlayerEntry, PlayerIdentity, QueueEntry, RoomId,
};
use duelsync_store::SharedStore;
use serde_json::{json, Value};

use crate::{now_ms, ClientError, GameConfig};

/// Places one player into the queue and drives pairing until a room
/// appears or the matchmaking window closes.
pub struct Matchmaker<'a, S> {
    store: &'a S,
    identity: &'a PlayerIdentity,
    config: &'a GameConfig,
}

impl<'a, S: SharedStore> Matchmaker<'a, S> {
    pub fn new(store: &'a S, identity: &'a PlayerIdentity, config: &'a GameConfig) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    /// Enqueues the player and resolves with the room they were paired
    /// into, or [`ClientError::NoOpponentFound`] after the timeout.
    ///
    /// The queue entry registers disconnect auto-removal at creation,
    /// so an abrupt connection loss cannot leave a stale entry behind.
    /// Both subscriptions are dropped on every return path, which is
    /// what makes a pairing that lands after the timeout unobservable.
    pub async fn find_match(&self) -> Result<RoomId, ClientError> {
        let entry = QueueEntry {
            player_id: self.identity.id.clone(),
            display_name: self.identity.display_name.clone(),
            enqueued_at_ms: now_ms(),
        };
        let entry_value =
            serde_json::to_value(&entry).map_err(ClientError::malformed(paths::MATCHMAKING))?;
        let entry_id = EntryId::new(self.store.push(paths::MATCHMAKING, entry_value).await?);
        let entry_path = paths::queue_entry(&entry_id);
        self.store.on_disconnect_remove(&entry_path).await?;

        tracing::info!(player_id = %self.identity.id, %entry_id, "matchmaking started");

        let mut rooms_sub = self.store.subscribe(paths::ROOMS);
        let mut queue_sub = self.store.subscribe(paths::MATCHMAKING);
        let timeout = tokio::time::sleep(self.config.matchmaking_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    self.store.remove(&entry_path).await?;
                    tracing::info!(player_id = %self.identity.id, "no opponent found before timeout");
                    return Err(ClientError::NoOpponentFound);
                }

                snapshot = rooms_sub.next() => {
                    let Some(snapshot) = snapshot else {
                        return Err(duelsync_store::StoreError::Unavailable.into());
                    };
                    if let Some(room_id) = self.find_own_room(snapshot.as_ref()) {
                        // Idempotent: the room creator may have removed
                        // our entry already.
                        self.store.remove(&entry_path).await?;
                        tracing::info!(player_id = %self.identity.id, %room_id, "paired into room");
                        return Ok(room_id);
                    }
                }

                snapshot = queue_sub.next() => {
                    let Some(snapshot) = snapshot else {
                        return Err(duelsync_store::StoreError::Unavailable.into());
                    };
                    if let Err(err) = self.try_pair(&entry_id, snapshot.as_ref()).await {
                        // Retried implicitly on the next queue change.
                        tracing::warn!(%err, "pairing attempt failed");
                    }
                }
            }
        }
    }

    /// Scans the rooms subtree for a live two-player room containing
    /// us. Rooms with any other player count are never accepted, so a
    /// third waiter cannot be mis-paired into an existing match, and a
    /// finished room we once played in never counts as a fresh pairing.
    fn find_own_room(&self, snapshot: Option<&Value>) -> Option<RoomId> {
        let rooms = snapshot?.as_object()?;
        for (room_id, room) in rooms {
            let Some(players) = room.get("players").and_then(Value::as_object) else {
                continue;
            };
            if players.len() != 2 || !players.contains_key(self.identity.id.as_str()) {
                continue;
            }
            let finished =
                room.pointer("/gameState/status").and_then(Value::as_str) == Some("finished");
            if !finished {
                return Some(RoomId::new(room_id.clone()));
            }
        }
        None
    }

    /// Attempts to pair the two oldest queue entries, if we are one of
    /// them. Exactly one of the two racing clients wins the pairing
    /// claim and performs the creation.
    async fn try_pair(
        &self,
        own_entry: &EntryId,
        snapshot: Option<&Value>,
    ) -> Result<(), ClientError> {
        let Some(entries) = snapshot.and_then(Value::as_object) else {
            return Ok(());
        };

        let mut queue: Vec<(EntryId, QueueEntry)> = entries
            .iter()
            .filter_map(|(id, value)| {
                // Entries we cannot parse are someone else's problem;
                // skipping keeps the scan alive.
                serde_json::from_value(value.clone())
                    .ok()
                    .map(|entry| (EntryId::new(id.clone()), entry))
            })
            .collect();
        if queue.len() < 2 {
            return Ok(());
        }

        // Oldest two get paired; push-id order breaks timestamp ties.
        queue.sort_by(|a, b| {
            (a.1.enqueued_at_ms, &a.0).cmp(&(b.1.enqueued_at_ms, &b.0))
        });
        let (first, second) = (&queue[0], &queue[1]);

        if first.0 != *own_entry && second.0 != *own_entry {
            return Ok(());
        }
        if first.1.player_id == second.1.player_id {
            // The same player queued twice; nothing to pair with.
            return Ok(());
        }

        let pairing_path = paths::pairing(&first.0, &second.0);
        if !self.store.claim(&pairing_path, Value::Bool(true)).await? {
            return Ok(());
        }

        let room_id = self.create_room(&first.1, &second.1).await?;
        self.store.remove(&paths::queue_entry(&first.0)).await?;
        self.store.remove(&paths::queue_entry(&second.0)).await?;
        tracing::info!(%room_id, "pair claimed, queue entries cleared");
        Ok(())
    }

    /// Writes the initial room record in one push: both player slots at
    /// score zero and a round-1 game state.
    async fn create_room(
        &self,
        a: &QueueEntry,
        b: &QueueEntry,
    ) -> Result<RoomId, ClientError> {
        let mut players = serde_json::Map::new();
        for entry in [a, b] {
            let slot = PlayerEntry {
                display_name: entry.display_name.clone(),
                score: 0,
            };
            players.insert(
                entry.player_id.to_string(),
                serde_json::to_value(&slot).map_err(ClientError::malformed(paths::ROOMS))?,
            );
        }
        let game_state = GameState {
            current_round: 1,
            timer: self.config.round_timer_secs,
            status: GameStatus::InProgress,
            winner: None,
        };
        let room = json!({
            "players": players,
            "gameState": serde_json::to_value(&game_state)
                .map_err(ClientError::malformed(paths::ROOMS))?,
        });

        let id = self.store.push(paths::ROOMS, room).await?;
        let room_id = RoomId::new(id);
        tracing::info!(%room_id, first = %a.player_id, second = %b.player_id, "room created");
        Ok(room_id)
    }
}
