//! The character source: random card draws over an external catalog.
//!
//! The catalog service itself is an external collaborator, reached
//! through the [`CharacterFetcher`] trait. [`Catalog`] wraps a fetcher
//! with the behavior the game needs: a session-lifetime cache to avoid
//! redundant lookups, bounded retries with pacing to stay under rate
//! limits, and a deterministic fallback roster so a draw request always
//! returns exactly the number of cards asked for. Drawing never fails —
//! degraded results are cards, not errors.

#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use duelsync_protocol::Character;
use rand::Rng;
use tokio::sync::Mutex;

/// Errors a concrete fetcher can report. They never escape [`Catalog`];
/// every failure degrades to a fallback card.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No character exists under this id (sparse id space).
    #[error("character {0} not found")]
    NotFound(u32),

    /// The catalog service could not be reached.
    #[error("catalog service unreachable")]
    Unreachable,
}

/// The external catalog boundary: fetch one character record by id.
pub trait CharacterFetcher: Send + Sync {
    async fn fetch(&self, id: u32) -> Result<Character, CatalogError>;
}

/// Tuning knobs for the draw loop.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Id space to draw from. The catalog's id space is sparse, so
    /// misses are expected and retried.
    pub id_range: Range<u32>,

    /// How many random ids to try per requested card before giving up
    /// and falling back.
    pub attempts_per_card: u32,

    /// Pause between fetch attempts, to stay under the catalog's rate
    /// limit. Tests set this to zero.
    pub pacing_delay: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            id_range: 1..50_000,
            attempts_per_card: 10,
            pacing_delay: Duration::from_millis(100),
        }
    }
}

struct Cache {
    /// Insertion order of cached ids — draws served from cache come out
    /// in the order they were first fetched.
    order: Vec<u32>,
    by_id: HashMap<u32, Character>,
}

/// Caching, rate-limited, never-failing character source.
pub struct Catalog<F> {
    fetcher: F,
    config: CatalogConfig,
    cache: Mutex<Cache>,
}

impl<F: CharacterFetcher> Catalog<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, CatalogConfig::default())
    }

    pub fn with_config(fetcher: F, config: CatalogConfig) -> Self {
        Self {
            fetcher,
            config,
            cache: Mutex::new(Cache {
                order: Vec::new(),
                by_id: HashMap::new(),
            }),
        }
    }

    /// Draws `count` characters. Always returns exactly `count`:
    /// cache first, then fresh fetches, then deterministic fallback
    /// cards keyed by position index for whatever could not be fetched.
    pub async fn fetch_characters(&self, count: usize) -> Vec<Character> {
        {
            let cache = self.cache.lock().await;
            if cache.order.len() >= count {
                return cache.order[..count]
                    .iter()
                    .map(|id| cache.by_id[id].clone())
                    .collect();
            }
        }

        let mut characters: Vec<Character> = Vec::with_capacity(count);
        let mut tried: Vec<u32> = Vec::new();

        while characters.len() < count {
            match self.draw_one(&mut tried).await {
                Some(card) => characters.push(card),
                None => break,
            }
        }

        // Not enough could be fetched — top up from the fallback
        // roster, keyed by position so both hands stay well formed.
        while characters.len() < count {
            let index = characters.len();
            tracing::warn!(index, "catalog draw failed, using fallback character");
            characters.push(fallback_character(index));
        }

        characters
    }

    /// Pre-populates the cache so the first real draw is instant.
    /// Failures are already degraded inside [`Self::fetch_characters`].
    pub async fn warm_cache(&self, count: usize) {
        let drawn = self.fetch_characters(count).await;
        tracing::info!(requested = count, drawn = drawn.len(), "cache warmed");
    }

    /// Number of characters currently cached.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.order.len()
    }

    /// One draw attempt loop: random ids until a fetch lands or the
    /// attempt budget runs out.
    async fn draw_one(&self, tried: &mut Vec<u32>) -> Option<Character> {
        for attempt in 0..self.config.attempts_per_card {
            let id = rand::rng().random_range(self.config.id_range.clone());
            if tried.contains(&id) {
                continue;
            }
            tried.push(id);

            if let Some(card) = self.cache.lock().await.by_id.get(&id) {
                return Some(card.clone());
            }

            match self.fetcher.fetch(id).await {
                Ok(card) => {
                    let mut cache = self.cache.lock().await;
                    cache.order.push(id);
                    cache.by_id.insert(id, card.clone());
                    return Some(card);
                }
                Err(err) => {
                    tracing::debug!(id, attempt, %err, "character fetch failed");
                }
            }

            if !self.config.pacing_delay.is_zero() {
                tokio::time::sleep(self.config.pacing_delay).await;
            }
        }
        None
    }
}

/// The fixed fallback roster. Deterministic per position index, so a
/// degraded hand is still a complete, stable hand.
pub fn fallback_character(index: usize) -> Character {
    const ROSTER: [(&str, &str, &str); 5] = [
        (
            "Goku",
            "https://via.placeholder.com/300x400?text=Goku",
            "A Saiyan warrior with incredible strength and the ability to transform into Super Saiyan forms.",
        ),
        (
            "Naruto Uzumaki",
            "https://via.placeholder.com/300x400?text=Naruto",
            "A ninja with the Nine-Tailed Fox sealed within him, possessing immense chakra and determination.",
        ),
        (
            "Luffy",
            "https://via.placeholder.com/300x400?text=Luffy",
            "A pirate with rubber powers who dreams of becoming the Pirate King.",
        ),
        (
            "Ichigo Kurosaki",
            "https://via.placeholder.com/300x400?text=Ichigo",
            "A Soul Reaper with the power to see and fight spirits, wielding a massive sword.",
        ),
        (
            "Edward Elric",
            "https://via.placeholder.com/300x400?text=Edward",
            "A young alchemist who can transmute matter without a transmutation circle.",
        ),
    ];

    let (name, image, description) = ROSTER[index % ROSTER.len()];
    Character {
        id: format!("fallback_{index}"),
        name: name.to_string(),
        image: image.to_string(),
        description: description.to_string(),
    }
}

// =========================================================================
// Tests
// =========================================================================
