//! Ratings and Rank Divisions
//!
//! Standard ELO with a logistic expected score and K-factor 32.
//! Divisions are fixed 100-point breakpoints from 800 up to Master.

use serde::{Deserialize, Serialize};

use crate::TimestampMs;

/// Rating assigned to unseen players.
pub const DEFAULT_RATING: i32 = 1000;

/// Default K-factor for rating updates.
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Outcome of a game from one player's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    /// Won the game (score 1).
    Win,
    /// Lost the game (score 0).
    Loss,
    /// Drew the game (score 0.5).
    Draw,
}

impl GameOutcome {
    /// ELO score for this outcome.
    pub fn score(self) -> f64 {
        match self {
            GameOutcome::Win => 1.0,
            GameOutcome::Draw => 0.5,
            GameOutcome::Loss => 0.0,
        }
    }
}

/// ELO rating delta for a game against `opponent_rating`.
///
/// `round(k * (score - 1 / (1 + 10^((opponent - player) / 400))))`
pub fn elo_change(player_rating: i32, opponent_rating: i32, score: f64, k: f64) -> i32 {
    let expected =
        1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - player_rating) / 400.0));
    (k * (score - expected)).round() as i32
}

/// Address-scoped rating record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Player address.
    pub address: String,
    /// Current ELO rating.
    pub rating: i32,
    /// Games won.
    pub wins: u32,
    /// Games lost.
    pub losses: u32,
    /// Games drawn.
    pub draws: u32,
    /// Total games played.
    pub total_games: u32,
    /// Current consecutive wins.
    pub win_streak: u32,
    /// High-water mark of `win_streak`.
    pub best_win_streak: u32,
    /// Current consecutive losses.
    pub lose_streak: u32,
    /// Running average game duration, in seconds.
    pub average_game_duration_secs: u64,
    /// Last rating update.
    pub last_active_ms: TimestampMs,
    /// First time the engine saw this address.
    pub joined_at_ms: TimestampMs,
}

impl PlayerStats {
    /// Fresh record at the default rating.
    pub fn new(address: &str, now_ms: TimestampMs) -> Self {
        Self {
            address: address.to_string(),
            rating: DEFAULT_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
            total_games: 0,
            win_streak: 0,
            best_win_streak: 0,
            lose_streak: 0,
            average_game_duration_secs: 0,
            last_active_ms: now_ms,
            joined_at_ms: now_ms,
        }
    }

    /// Apply a finished game: rating delta, streak bookkeeping and the
    /// running-average duration.
    pub fn apply_result(
        &mut self,
        outcome: GameOutcome,
        rating_change: i32,
        game_duration_secs: u64,
        now_ms: TimestampMs,
    ) {
        self.rating += rating_change;
        self.total_games += 1;
        self.last_active_ms = now_ms;

        let previous_games = u64::from(self.total_games - 1);
        self.average_game_duration_secs = ((self.average_game_duration_secs as f64
            * previous_games as f64
            + game_duration_secs as f64)
            / f64::from(self.total_games))
        .round() as u64;

        match outcome {
            GameOutcome::Win => {
                self.wins += 1;
                self.win_streak += 1;
                self.lose_streak = 0;
                if self.win_streak > self.best_win_streak {
                    self.best_win_streak = self.win_streak;
                }
            }
            GameOutcome::Loss => {
                self.losses += 1;
                self.lose_streak += 1;
                self.win_streak = 0;
            }
            GameOutcome::Draw => {
                self.draws += 1;
                self.win_streak = 0;
                self.lose_streak = 0;
            }
        }
    }
}

/// Named rank divisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Division {
    /// Below 1000.
    Bronze,
    /// 1000 to 1299.
    Silver,
    /// 1300 to 1599.
    Gold,
    /// 1600 to 1899.
    Platinum,
    /// 1900 to 2199.
    Diamond,
    /// 2200 and above.
    Master,
}

/// A division with its tier (III is the lowest tier, I the highest).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDivision {
    /// Division band.
    pub division: Division,
    /// Tier within the division; Master has a single tier.
    pub tier: u8,
}

impl RankDivision {
    /// Display name, e.g. "Gold II".
    pub fn name(&self) -> String {
        if self.division == Division::Master {
            return "Master".to_string();
        }
        let tier = match self.tier {
            3 => "III",
            2 => "II",
            _ => "I",
        };
        format!("{:?} {}", self.division, tier)
    }
}

/// Fixed 100-point breakpoints from 800 (Bronze III) to Master (2200+).
pub fn rank_division(rating: i32) -> RankDivision {
    let (division, tier) = match rating {
        r if r < 800 => (Division::Bronze, 3),
        r if r < 900 => (Division::Bronze, 2),
        r if r < 1000 => (Division::Bronze, 1),
        r if r < 1100 => (Division::Silver, 3),
        r if r < 1200 => (Division::Silver, 2),
        r if r < 1300 => (Division::Silver, 1),
        r if r < 1400 => (Division::Gold, 3),
        r if r < 1500 => (Division::Gold, 2),
        r if r < 1600 => (Division::Gold, 1),
        r if r < 1700 => (Division::Platinum, 3),
        r if r < 1800 => (Division::Platinum, 2),
        r if r < 1900 => (Division::Platinum, 1),
        r if r < 2000 => (Division::Diamond, 3),
        r if r < 2100 => (Division::Diamond, 2),
        r if r < 2200 => (Division::Diamond, 1),
        _ => (Division::Master, 1),
    };
    RankDivision { division, tier }
}

// =============================================================================
// TESTS
// =============================================================================
