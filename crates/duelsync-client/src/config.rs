//! Session configuration.

use std::time::Duration;

/// Timing windows and thresholds for a match.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// How long to wait in the queue before giving up with
    /// "no opponent found".
    pub matchmaking_timeout: Duration,

    /// How long a resolved round stays on screen before the resolver
    /// advances to the next one.
    pub result_display_delay: Duration,

    /// Pause before re-entering the queue after a finished match.
    pub rematch_pause: Duration,

    /// Informational per-round countdown written into `gameState.timer`.
    /// No protocol decision depends on it.
    pub round_timer_secs: u32,

    /// Cards dealt to each player. The hand is fixed for the match.
    pub hand_size: usize,

    /// Win threshold in half-points (6 = first to 3 points).
    pub win_threshold: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            matchmaking_timeout: Duration::from_secs(30),
            result_display_delay: Duration::from_secs(5),
            rematch_pause: Duration::from_secs(1),
            round_timer_secs: 20,
            hand_size: 5,
            win_threshold: 6,
        }
    }
}
