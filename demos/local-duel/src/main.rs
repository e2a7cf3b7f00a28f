//! Two clients, one in-process store, one full match.
//!
//! Run with `cargo run -p local-duel`. Both players pick random cards
//! from their hands; a local judge decides rounds, so the match plays
//! out without any external service.

use std::sync::Arc;

use duelsync_arbiter::{Arbiter, ArbiterError, Judge, Outcome, Verdict};
use duelsync_catalog::{fallback_character, Catalog, CatalogError, CharacterFetcher};
use duelsync_client::{ClientError, GameClient, GameEvent};
use duelsync_protocol::{Character, MatchWinner, PlayerIdentity};
use duelsync_store::MemoryStore;
use rand::Rng;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

/// Serves the built-in roster instead of a remote catalog.
struct RosterFetcher;

impl CharacterFetcher for RosterFetcher {
    async fn fetch(&self, id: u32) -> Result<Character, CatalogError> {
        let mut card = fallback_character(id as usize);
        card.id = id.to_string();
        Ok(card)
    }
}

/// Local stand-in for the language-model judge: longer description
/// wins, equal lengths tie.
struct WordCountJudge;

impl Judge for WordCountJudge {
    async fn judge(&self, first: &Character, second: &Character) -> Result<Verdict, ArbiterError> {
        let (a, b) = (first.description.len(), second.description.len());
        let outcome = match a.cmp(&b) {
            std::cmp::Ordering::Greater => Outcome::First,
            std::cmp::Ordering::Less => Outcome::Second,
            std::cmp::Ordering::Equal => Outcome::Tie,
        };
        Ok(Verdict {
            outcome,
            explanation: format!(
                "{} has the richer legend ({a} vs {b} characters of lore).",
                if outcome == Outcome::Second {
                    &second.name
                } else {
                    &first.name
                }
            ),
        })
    }
}

type DemoClient = GameClient<MemoryStore, RosterFetcher, WordCountJudge>;

fn make_client(
    store: MemoryStore,
    id: &str,
    name: &str,
) -> (Arc<DemoClient>, UnboundedReceiver<GameEvent>) {
    let (client, events) = GameClient::new(
        store,
        Catalog::new(RosterFetcher),
        Arbiter::new(WordCountJudge),
        PlayerIdentity::new(id, name),
    );
    (Arc::new(client), events)
}

/// Plays one side of the match: waits for rounds and picks a random
/// card from the hand each time.
async fn play(
    client: Arc<DemoClient>,
    mut events: UnboundedReceiver<GameEvent>,
) -> Result<MatchWinner, ClientError> {
    let room_id = client.find_match().await?;
    let name = client.identity().display_name.clone();
    println!("[{name}] matched into room {room_id}");

    let runner = {
        let (client, room_id) = (Arc::clone(&client), room_id.clone());
        tokio::spawn(async move { client.run_match(&room_id).await })
    };

    let mut hand: Vec<Character> = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            GameEvent::HandDealt(cards) => {
                println!(
                    "[{name}] hand: {}",
                    cards
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                hand = cards;
            }
            GameEvent::RoundStarted { round } => {
                let pick = rand::rng().random_range(0..hand.len());
                println!("[{name}] round {round}: playing {}", hand[pick].name);
                client.submit_selection(&room_id, &hand, pick).await?;
            }
            GameEvent::OpponentSelected => println!("[{name}] opponent locked in"),
            GameEvent::RoundResolved(result) => {
                println!(
                    "[{name}] round {} {:?}: {} vs {} — {}",
                    result.round,
                    result.outcome,
                    result.self_card.name,
                    result.opponent_card.name,
                    result.explanation
                );
            }
            GameEvent::ScoreChanged(scores) => {
                println!(
                    "[{name}] score {} : {}",
                    scores.own_points(),
                    scores.opponent_points()
                );
            }
            GameEvent::GameFinished { .. } | GameEvent::OpponentLeft => break,
            GameEvent::MatchFound { .. } => {}
        }
    }

    match runner.await {
        Ok(result) => result,
        Err(_) => Err(duelsync_store::StoreError::Unavailable.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = MemoryStore::new();
    let (ryu, ryu_events) = make_client(store.client(), "p1-ryu", "Ryu");
    let (ken, ken_events) = make_client(store.client(), "p2-ken", "Ken");

    let left = tokio::spawn(play(ryu, ryu_events));
    let right = tokio::spawn(play(ken, ken_events));

    let winner = match left.await {
        Ok(result) => result?,
        Err(_) => return Err(duelsync_store::StoreError::Unavailable.into()),
    };
    let _ = right.await;

    match winner {
        MatchWinner::Player(id) => println!("match over: {id} takes it"),
        MatchWinner::Tie => println!("match over: dead heat"),
    }
    Ok(())
}
