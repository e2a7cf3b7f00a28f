//! End-to-end match flows: two full clients over one in-process store.
//!
//! Every test runs on a paused clock, so the 30-second matchmaking
//! window and the 5-second result display advance instantly once the
//! runtime goes idle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use duelsync_arbiter::{
    Arbiter, ArbiterError, Judge, Outcome, Verdict, FALLBACK_EXPLANATION,
};
use duelsync_catalog::{Catalog, CatalogConfig, CatalogError, CharacterFetcher};
use duelsync_client::{ClientError, GameClient, GameEvent};
use duelsync_protocol::{paths, Character, MatchWinner, PlayerId, PlayerIdentity, RoomId, RoundOutcome};
use duelsync_store::{MemoryStore, SharedStore};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Fetcher whose cards are tagged with the owning player, so tests can
/// tell whose card reached the judge.
struct TaggedFetcher(String);

impl CharacterFetcher for TaggedFetcher {
    async fn fetch(&self, id: u32) -> Result<Character, CatalogError> {
        Ok(Character {
            id: format!("{}-{id}", self.0),
            name: format!("{} fighter {id}", self.0),
            image: format!("https://cards.example/{id}.jpg"),
            description: "A test contender.".into(),
        })
    }
}

/// Scripted judge shared by both clients: fixed outcome (or scripted
/// failure), plus counters that expose how often and with what inputs
/// it was called.
#[derive(Clone)]
struct SharedJudge {
    outcome: Outcome,
    fail: bool,
    calls: Arc<AtomicU32>,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl SharedJudge {
    fn fixed(outcome: Outcome) -> Self {
        Self {
            outcome,
            fail: false,
            calls: Arc::new(AtomicU32::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn down() -> Self {
        Self {
            fail: true,
            ..Self::fixed(Outcome::First)
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Judge for SharedJudge {
    async fn judge(&self, first: &Character, second: &Character) -> Result<Verdict, ArbiterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((first.name.clone(), second.name.clone()));
        if self.fail {
            return Err(ArbiterError::Unreachable);
        }
        Ok(Verdict {
            outcome: self.outcome,
            explanation: "Clear power gap.".into(),
        })
    }
}

type TestClient = GameClient<MemoryStore, TaggedFetcher, SharedJudge>;

fn make_client(
    store: MemoryStore,
    id: &str,
    judge: SharedJudge,
) -> (Arc<TestClient>, UnboundedReceiver<GameEvent>) {
    let catalog = Catalog::with_config(
        TaggedFetcher(id.to_string()),
        CatalogConfig {
            pacing_delay: Duration::ZERO,
            ..CatalogConfig::default()
        },
    );
    let identity = PlayerIdentity::new(id, format!("Player {id}"));
    let (client, events) = GameClient::new(store, catalog, Arbiter::new(judge), identity);
    (Arc::new(client), events)
}

/// Enqueues both clients (first one strictly earlier) and returns the
/// shared room both resolved to.
async fn pair(a: &Arc<TestClient>, b: &Arc<TestClient>) -> RoomId {
    let first = {
        let a = Arc::clone(a);
        tokio::spawn(async move { a.find_match().await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let second = {
        let b = Arc::clone(b);
        tokio::spawn(async move { b.find_match().await })
    };

    let room_a = first.await.unwrap().unwrap();
    let room_b = second.await.unwrap().unwrap();
    assert_eq!(room_a, room_b, "both players must land in the same room");
    room_a
}

/// UI stand-in: submits the first card of the hand whenever a round
/// starts, and collects every event until the match ends.
fn spawn_driver(
    client: Arc<TestClient>,
    room_id: RoomId,
    mut events: UnboundedReceiver<GameEvent>,
) -> JoinHandle<Vec<GameEvent>> {
    tokio::spawn(async move {
        let mut hand: Vec<Character> = Vec::new();
        let mut log = Vec::new();
        while let Some(event) = events.recv().await {
            log.push(event.clone());
            match event {
                GameEvent::HandDealt(cards) => hand = cards,
                GameEvent::RoundStarted { .. } => {
                    client
                        .submit_selection(&room_id, &hand, 0)
                        .await
                        .unwrap();
                }
                GameEvent::GameFinished { .. } | GameEvent::OpponentLeft => break,
                _ => {}
            }
        }
        log
    })
}

fn resolved_outcomes(log: &[GameEvent]) -> Vec<RoundOutcome> {
    log.iter()
        .filter_map(|event| match event {
            GameEvent::RoundResolved(result) => Some(result.outcome),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Full matches
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_first_to_three_points_wins_the_match() {
    let store = MemoryStore::new();
    // "first" is always the lexically smaller player, so a fixed
    // Outcome::First judge means alice sweeps.
    let judge = SharedJudge::fixed(Outcome::First);
    let (alice, alice_events) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge.clone());

    let room = pair(&alice, &bob).await;
    let alice_log = spawn_driver(Arc::clone(&alice), room.clone(), alice_events);
    let bob_log = spawn_driver(Arc::clone(&bob), room.clone(), bob_events);

    let alice_run = {
        let (c, r) = (Arc::clone(&alice), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };

    let expected = MatchWinner::Player(PlayerId::new("alice"));
    assert_eq!(alice_run.await.unwrap().unwrap(), expected);
    assert_eq!(bob_run.await.unwrap().unwrap(), expected);

    // Three straight wins end the match; exactly one client judged
    // each round despite both observing the dual-completion state.
    assert_eq!(judge.calls(), 3);
    assert_eq!(
        resolved_outcomes(&alice_log.await.unwrap()),
        vec![RoundOutcome::Win; 3]
    );
    assert_eq!(
        resolved_outcomes(&bob_log.await.unwrap()),
        vec![RoundOutcome::Lose; 3]
    );

    // Lifetime counters: one game each, a win for alice, a loss for bob.
    let read_stat = |player: &str, counter: &str| {
        let store = store.clone();
        let path = paths::stat(&PlayerId::new(player), counter);
        async move { store.read(&path).await.unwrap() }
    };
    assert_eq!(read_stat("alice", "totalGames").await, Some(1.into()));
    assert_eq!(read_stat("alice", "wins").await, Some(1.into()));
    assert_eq!(read_stat("bob", "totalGames").await, Some(1.into()));
    assert_eq!(read_stat("bob", "losses").await, Some(1.into()));
}

#[tokio::test(start_paused = true)]
async fn test_all_tie_rounds_end_in_a_drawn_match() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::Tie);
    let (alice, alice_events) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge.clone());

    let room = pair(&alice, &bob).await;
    let alice_log = spawn_driver(Arc::clone(&alice), room.clone(), alice_events);
    spawn_driver(Arc::clone(&bob), room.clone(), bob_events);

    let alice_run = {
        let (c, r) = (Arc::clone(&alice), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };

    // Half a point per player per round: both cross the threshold on
    // round six, simultaneously, and the match is a draw.
    assert_eq!(alice_run.await.unwrap().unwrap(), MatchWinner::Tie);
    assert_eq!(bob_run.await.unwrap().unwrap(), MatchWinner::Tie);
    assert_eq!(judge.calls(), 6);
    assert_eq!(
        resolved_outcomes(&alice_log.await.unwrap()),
        vec![RoundOutcome::Tie; 6]
    );

    // A drawn match counts as a loss in the lifetime stats.
    let losses = store
        .read(&paths::stat(&PlayerId::new("alice"), "losses"))
        .await
        .unwrap();
    assert_eq!(losses, Some(1.into()));
}

#[tokio::test(start_paused = true)]
async fn test_judge_inputs_are_ordered_by_player_id() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::Second);
    let (alice, alice_events) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge.clone());

    let room = pair(&alice, &bob).await;
    spawn_driver(Arc::clone(&alice), room.clone(), alice_events);
    spawn_driver(Arc::clone(&bob), room.clone(), bob_events);

    let alice_run = {
        let (c, r) = (Arc::clone(&alice), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };

    assert_eq!(
        alice_run.await.unwrap().unwrap(),
        MatchWinner::Player(PlayerId::new("bob"))
    );
    bob_run.await.unwrap().unwrap();

    // Whichever client won the resolver claim, the judge always saw
    // (alice's card, bob's card) in that order.
    let seen = judge.seen();
    assert!(!seen.is_empty());
    for (first, second) in seen {
        assert!(first.starts_with("alice"), "first card was {first}");
        assert!(second.starts_with("bob"), "second card was {second}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_judge_still_finishes_the_match() {
    let store = MemoryStore::new();
    let judge = SharedJudge::down();
    let (alice, alice_events) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge.clone());

    let room = pair(&alice, &bob).await;
    let alice_log = spawn_driver(Arc::clone(&alice), room.clone(), alice_events);
    spawn_driver(Arc::clone(&bob), room.clone(), bob_events);

    let alice_run = {
        let (c, r) = (Arc::clone(&alice), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };

    // Degraded rounds always pick a winner, so somebody reaches three
    // points within five rounds.
    let winner = alice_run.await.unwrap().unwrap();
    assert_eq!(bob_run.await.unwrap().unwrap(), winner);
    assert!(matches!(winner, MatchWinner::Player(_)));
    assert!(judge.calls() <= 5);

    for event in alice_log.await.unwrap() {
        if let GameEvent::RoundResolved(result) = event {
            assert_eq!(result.explanation, FALLBACK_EXPLANATION);
            assert_ne!(result.outcome, RoundOutcome::Tie);
        }
    }
}

// ---------------------------------------------------------------------------
// Matchmaking windows
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_lone_player_times_out_with_no_opponent_found() {
    let store = MemoryStore::new();
    let (alice, _events) = make_client(store.client(), "alice", SharedJudge::down());

    let started = tokio::time::Instant::now();
    let err = alice.find_match().await.unwrap_err();
    assert!(matches!(err, ClientError::NoOpponentFound));
    assert!(started.elapsed() >= Duration::from_secs(30));

    // The queue entry must not linger after the window closes.
    let queue = store.read(paths::MATCHMAKING).await.unwrap();
    let stale = queue
        .as_ref()
        .and_then(|v| v.as_object())
        .map(|o| o.len())
        .unwrap_or(0);
    assert_eq!(stale, 0);
}

#[tokio::test(start_paused = true)]
async fn test_room_landing_after_the_timeout_is_ignored() {
    let store = MemoryStore::new();
    let (alice, _events) = make_client(store.client(), "alice", SharedJudge::down());

    let waiting = {
        let c = Arc::clone(&alice);
        tokio::spawn(async move { c.find_match().await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    // Let the matchmaking window close, then land a two-player room
    // naming alice, the way a slow partner finishing the pairing would.
    tokio::time::sleep(Duration::from_secs(31)).await;
    store
        .write(
            "rooms/0000009999",
            serde_json::json!({
                "players": {
                    "alice": {"displayName": "Player alice", "score": 0},
                    "bob": {"displayName": "Player bob", "score": 0},
                },
                "gameState": {"currentRound": 1, "timer": 20, "status": "in_progress"},
            }),
        )
        .await
        .unwrap();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    // The timeout already tore down the subscriptions, so the late
    // room must never be picked up.
    assert!(matches!(
        waiting.await.unwrap().unwrap_err(),
        ClientError::NoOpponentFound
    ));
    let queue = store.read(paths::MATCHMAKING).await.unwrap().unwrap();
    assert!(queue.as_object().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_third_waiter_is_not_pulled_into_an_existing_pair() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::First);
    let (alice, _a) = make_client(store.client(), "alice", judge.clone());
    let (bob, _b) = make_client(store.client(), "bob", judge.clone());
    let (carol, _c) = make_client(store.client(), "carol", judge.clone());

    let first = {
        let c = Arc::clone(&alice);
        tokio::spawn(async move { c.find_match().await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let second = {
        let c = Arc::clone(&bob);
        tokio::spawn(async move { c.find_match().await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let third = {
        let c = Arc::clone(&carol);
        tokio::spawn(async move { c.find_match().await })
    };

    // The two oldest waiters pair; the third waits out its own window.
    let room_a = first.await.unwrap().unwrap();
    let room_b = second.await.unwrap().unwrap();
    assert_eq!(room_a, room_b);
    assert!(matches!(
        third.await.unwrap().unwrap_err(),
        ClientError::NoOpponentFound
    ));

    let rooms = store.read(paths::ROOMS).await.unwrap().unwrap();
    assert_eq!(rooms.as_object().unwrap().len(), 1, "exactly one room");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_queued_clears_the_entry() {
    let store = MemoryStore::new();
    let connection = store.client();
    let (alice, _events) = make_client(connection.clone(), "alice", SharedJudge::down());

    let waiting = {
        let c = Arc::clone(&alice);
        tokio::spawn(async move { c.find_match().await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let queued = store.read(paths::MATCHMAKING).await.unwrap().unwrap();
    assert_eq!(queued.as_object().unwrap().len(), 1);

    // Connection loss runs the registered auto-removal immediately;
    // nobody can be paired against the ghost entry afterwards.
    connection.disconnect();
    let queued = store.read(paths::MATCHMAKING).await.unwrap().unwrap();
    assert!(queued.as_object().unwrap().is_empty());

    assert!(matches!(
        waiting.await.unwrap().unwrap_err(),
        ClientError::NoOpponentFound
    ));
}

#[tokio::test(start_paused = true)]
async fn test_rematch_pairs_into_a_fresh_room() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::First);
    let (alice, alice_events) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge);

    let first_room = pair(&alice, &bob).await;
    spawn_driver(Arc::clone(&alice), first_room.clone(), alice_events);
    spawn_driver(Arc::clone(&bob), first_room.clone(), bob_events);
    let alice_run = {
        let (c, r) = (Arc::clone(&alice), first_room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), first_room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    alice_run.await.unwrap().unwrap();
    bob_run.await.unwrap().unwrap();

    // Queue again: the finished room must not be mistaken for a fresh
    // pairing, even though both ids appeared in it.
    let again_a = {
        let c = Arc::clone(&alice);
        tokio::spawn(async move { c.play_again().await })
    };
    let again_b = {
        let c = Arc::clone(&bob);
        tokio::spawn(async move { c.play_again().await })
    };
    let room_a = again_a.await.unwrap().unwrap();
    let room_b = again_b.await.unwrap().unwrap();
    assert_eq!(room_a, room_b);
    assert_ne!(room_a, first_room);
}

#[tokio::test(start_paused = true)]
async fn test_offline_store_surfaces_unavailable() {
    let store = MemoryStore::new();
    let connection = store.client();
    connection.set_offline(true);
    let (alice, _events) = make_client(connection, "alice", SharedJudge::down());

    let err = alice.find_match().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Store(duelsync_store::StoreError::Unavailable)
    ));
}

// ---------------------------------------------------------------------------
// Abandonment and selection discipline
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_opponent_leaving_abandons_the_room() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::First);
    let (alice, _a) = make_client(store.client(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge);

    let room = pair(&alice, &bob).await;
    let bob_log = spawn_driver(Arc::clone(&bob), room.clone(), bob_events);
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    alice.leave(&room).await.unwrap();

    assert!(matches!(
        bob_run.await.unwrap().unwrap_err(),
        ClientError::RoomAbandoned(_)
    ));
    assert!(bob_log
        .await
        .unwrap()
        .iter()
        .any(|e| matches!(e, GameEvent::OpponentLeft)));
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_clears_the_player_slot() {
    let store = MemoryStore::new();
    let judge = SharedJudge::fixed(Outcome::First);
    let alice_connection = store.client();
    let (alice, _a) = make_client(alice_connection.clone(), "alice", judge.clone());
    let (bob, bob_events) = make_client(store.client(), "bob", judge);

    let room = pair(&alice, &bob).await;
    alice_connection
        .on_disconnect_remove(&paths::player(&room, &alice.identity().id))
        .await
        .unwrap();

    spawn_driver(Arc::clone(&bob), room.clone(), bob_events);
    let bob_run = {
        let (c, r) = (Arc::clone(&bob), room.clone());
        tokio::spawn(async move { c.run_match(&r).await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    alice_connection.disconnect();

    assert!(matches!(
        bob_run.await.unwrap().unwrap_err(),
        ClientError::RoomAbandoned(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_within_a_round_is_ignored() {
    let store = MemoryStore::new();
    let room = RoomId::new("room-1");
    let player = PlayerId::new("alice");
    let hand: Vec<Character> = (0..5).map(duelsync_catalog::fallback_character).collect();

    let first = duelsync_client::submit_selection(&store, &room, &player, &hand, 0)
        .await
        .unwrap();
    assert!(first);

    // Second submission in the same round is a no-op: the committed
    // pick stays the original card.
    let second = duelsync_client::submit_selection(&store, &room, &player, &hand, 3)
        .await
        .unwrap();
    assert!(!second);

    let stored = store
        .read(&paths::selection(&room, &player))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["card"]["id"], "fallback_0");
}

#[tokio::test(start_paused = true)]
async fn test_out_of_hand_index_is_rejected() {
    let store = MemoryStore::new();
    let room = RoomId::new("room-1");
    let player = PlayerId::new("alice");
    let hand: Vec<Character> = (0..5).map(duelsync_catalog::fallback_character).collect();

    let err = duelsync_client::submit_selection(&store, &room, &player, &hand, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidCardIndex(5)));
}
