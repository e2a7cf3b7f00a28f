//! The round arbiter: decides which of two cards wins a round.
//!
//! The actual judgment comes from an external language-model service,
//! reached through the [`Judge`] trait. [`Arbiter`] wraps a judge and
//! guarantees the protocol-facing contract: [`Arbiter::judge`] never
//! fails and never blocks a round on an unreachable service — internal
//! failures degrade to a uniform-random outcome with a fixed
//! explanation, matching what the players see when the judge is down.

#![allow(async_fn_in_trait)]

use duelsync_protocol::Character;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Explanation attached to a degraded (randomly decided) verdict.
pub const FALLBACK_EXPLANATION: &str =
    "Unable to determine winner due to judge error. Random result generated.";

/// Errors a concrete judge can report. They never escape [`Arbiter`].
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// The judgment service could not be reached.
    #[error("judge service unreachable")]
    Unreachable,

    /// The service answered with something that isn't a verdict.
    #[error("malformed judge response: {0}")]
    MalformedResponse(String),
}

/// Which of the two presented cards won.
///
/// Positional, not player-relative: callers present the cards in the
/// canonical player order and map the outcome back themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    First,
    Second,
    Tie,
}

/// A judged round: the positional outcome plus prose reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub explanation: String,
}

/// The external judgment boundary.
pub trait Judge: Send + Sync {
    async fn judge(&self, first: &Character, second: &Character)
        -> Result<Verdict, ArbiterError>;
}

/// Never-failing arbiter over a fallible judge.
pub struct Arbiter<J> {
    judge: J,
}

impl<J: Judge> Arbiter<J> {
    pub fn new(judge: J) -> Self {
        Self { judge }
    }

    /// Judges a card pair. On judge failure, returns a uniform-random
    /// [`Outcome::First`]/[`Outcome::Second`] verdict — a degraded
    /// round still resolves, it is never randomly declared a tie.
    pub async fn judge(&self, first: &Character, second: &Character) -> Verdict {
        match self.judge.judge(first, second).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(%err, first = %first.name, second = %second.name,
                    "judge failed, falling back to random outcome");
                let outcome = if rand::rng().random_bool(0.5) {
                    Outcome::First
                } else {
                    Outcome::Second
                };
                Verdict {
                    outcome,
                    explanation: FALLBACK_EXPLANATION.to_string(),
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
