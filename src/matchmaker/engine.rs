//! Queues and Match Formation
//!
//! Per-game queues with a widening rating window: the longest-waiting
//! player anchors each search, and the acceptable rating gap grows with
//! their wait. Queue scans and removals are not atomic across threads;
//! drive each game's queue from a single serialization domain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::matchmaker::rating::{elo_change, GameOutcome, PlayerStats, DEFAULT_K_FACTOR};
use crate::TimestampMs;

/// Base rating window for a fresh queue entry.
pub const BASE_RATING_WINDOW: i32 = 50;

/// Window growth per 30 seconds of waiting.
pub const WINDOW_GROWTH_PER_STEP: i32 = 10;

/// Hard cap on the rating window.
pub const MAX_RATING_WINDOW: i32 = 300;

/// Seconds of estimated wait per queue position.
const WAIT_SECS_PER_POSITION: u64 = 30;

/// Errors signalling caller misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchmakerError {
    /// Address already has an active entry in this game's queue.
    #[error("{address} is already queued for game {game_id}")]
    AlreadyQueued {
        /// Game whose queue was targeted.
        game_id: String,
        /// Offending address.
        address: String,
    },

    /// No active match with that id.
    #[error("match {0} not found")]
    MatchNotFound(String),
}

/// Matchmaking preferences submitted with a queue join.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPreferences {
    /// Preferred region, if any.
    pub region: Option<String>,
    /// Preferred game mode, if any.
    pub mode: Option<String>,
}

/// Queue-join request from the admission layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Player address.
    pub address: String,
    /// Matchmaking preferences.
    pub preferences: MatchPreferences,
    /// Opponents from recent matches, used to avoid immediate rematches.
    pub recent_opponents: Vec<String>,
}

/// A waiting player, stamped with their rating at join time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Player address.
    pub address: String,
    /// Rating snapshot at join time.
    pub rating: i32,
    /// When the player joined the queue.
    pub queued_at_ms: TimestampMs,
    /// Matchmaking preferences.
    pub preferences: MatchPreferences,
    /// Recent opponents to avoid.
    pub recent_opponents: Vec<String>,
}

/// One side of a team match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Team members.
    pub players: Vec<QueueEntry>,
    /// Average rating of the team.
    pub average_rating: f64,
}

/// The composition of a formed match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchShape {
    /// Head-to-head pairing.
    Duel {
        /// The two matched players.
        players: Vec<QueueEntry>,
        /// Quality score the pairing won with.
        match_score: f64,
    },
    /// Two snake-drafted teams.
    Teams {
        /// First team.
        team_a: Team,
        /// Second team.
        team_b: Team,
        /// Players per team.
        team_size: usize,
    },
    /// Free-for-all lobby, no rating balancing.
    BattleRoyale {
        /// Matched players in queue order.
        players: Vec<QueueEntry>,
        /// Average rating of the lobby.
        average_rating: f64,
    },
}

/// A formed match awaiting its session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unique match identifier.
    pub match_id: String,
    /// Game the match belongs to.
    pub game_id: String,
    /// Match composition.
    pub shape: MatchShape,
    /// Rating spread: duel gap, team average gap, or lobby max-min.
    pub rating_difference: f64,
    /// When the match was formed.
    pub created_at_ms: TimestampMs,
}

/// Receipt for a queue join.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueReceipt {
    /// Position in the queue after the join (and any match formed).
    pub position: usize,
    /// Rough wait estimate in seconds.
    pub estimated_wait_secs: u64,
    /// Match formed immediately by this join, if any.
    pub matched: Option<MatchRecord>,
}

/// Point-in-time queue summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Entries currently waiting.
    pub players_in_queue: usize,
    /// Rough wait estimate in seconds.
    pub estimated_wait_secs: u64,
    /// Average rating of waiting players (0 when empty).
    pub average_rating: i32,
    /// Longest current wait in seconds.
    pub oldest_wait_secs: u64,
}

/// Declared result of a finished match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Winning address; None declares a draw.
    pub winner: Option<String>,
    /// Match duration in seconds.
    pub duration_secs: u64,
}

/// Rating updates produced by ending a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Ended match.
    pub match_id: String,
    /// Declared duration.
    pub duration_secs: u64,
    /// Updated rating records (duels only; team and battle-royale
    /// matches report no rating movement).
    pub updates: Vec<PlayerStats>,
}

/// ELO-rated queueing and match formation across games.
#[derive(Default)]
pub struct Matchmaker {
    queues: BTreeMap<String, Vec<QueueEntry>>,
    stats: BTreeMap<String, PlayerStats>,
    active_matches: BTreeMap<String, MatchRecord>,
}

impl Matchmaker {
    /// Create an empty matchmaker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rating record for an address, lazily created at the default
    /// rating.
    pub fn player_stats(&mut self, address: &str, now_ms: TimestampMs) -> &PlayerStats {
        self.stats
            .entry(address.to_string())
            .or_insert_with(|| PlayerStats::new(address, now_ms))
    }

    /// Read-only rating record lookup.
    pub fn get_player_stats(&self, address: &str) -> Option<&PlayerStats> {
        self.stats.get(address)
    }

    /// Join a game's queue and immediately attempt to form a match.
    ///
    /// An address holds at most one active entry per game.
    pub fn join_queue(
        &mut self,
        game_id: &str,
        profile: PlayerProfile,
        now_ms: TimestampMs,
    ) -> Result<QueueReceipt, MatchmakerError> {
        let rating = self.player_stats(&profile.address, now_ms).rating;

        let queue = self.queues.entry(game_id.to_string()).or_default();
        if queue.iter().any(|e| e.address == profile.address) {
            return Err(MatchmakerError::AlreadyQueued {
                game_id: game_id.to_string(),
                address: profile.address,
            });
        }

        debug!(game_id, address = %profile.address, rating, "queue join");
        queue.push(QueueEntry {
            address: profile.address,
            rating,
            queued_at_ms: now_ms,
            preferences: profile.preferences,
            recent_opponents: profile.recent_opponents,
        });

        let matched = self.find_match(game_id, now_ms);
        let remaining = self.queues.get(game_id).map(Vec::len).unwrap_or(0);

        Ok(QueueReceipt {
            position: remaining,
            estimated_wait_secs: self.estimate_wait(game_id),
            matched,
        })
    }

    /// Remove an address from a game's queue. True if an entry existed.
    pub fn leave_queue(&mut self, game_id: &str, address: &str) -> bool {
        match self.queues.get_mut(game_id) {
            Some(queue) => {
                let before = queue.len();
                queue.retain(|e| e.address != address);
                queue.len() != before
            }
            None => false,
        }
    }

    /// Form the best available head-to-head match.
    ///
    /// The longest-waiting player anchors the search; candidates must be
    /// within the anchor's current rating window, and the best is chosen
    /// by quality score. Matched entries leave the queue atomically
    /// within this call.
    pub fn find_match(&mut self, game_id: &str, now_ms: TimestampMs) -> Option<MatchRecord> {
        let queue = self.queues.get_mut(game_id)?;
        if queue.len() < 2 {
            return None;
        }

        queue.sort_by_key(|e| e.queued_at_ms);
        let anchor = queue[0].clone();
        let window = rating_window(now_ms.saturating_sub(anchor.queued_at_ms));

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in queue.iter().enumerate().skip(1) {
            let rating_diff = (anchor.rating - candidate.rating).abs();
            if rating_diff > window {
                continue;
            }
            let score = match_score(&anchor, candidate);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((index, score));
            }
        }

        let (index, score) = best?;
        let opponent = queue.remove(index);
        queue.remove(0);

        let rating_difference = f64::from((anchor.rating - opponent.rating).abs());
        let record = MatchRecord {
            match_id: new_match_id(),
            game_id: game_id.to_string(),
            shape: MatchShape::Duel {
                players: vec![anchor, opponent],
                match_score: score,
            },
            rating_difference,
            created_at_ms: now_ms,
        };

        info!(
            game_id,
            match_id = %record.match_id,
            rating_difference,
            "duel match formed"
        );
        self.active_matches
            .insert(record.match_id.clone(), record.clone());
        Some(record)
    }

    /// Form a team match once `2 * team_size` players are queued.
    ///
    /// Players are drafted in rating order, switching sides every
    /// `team_size` picks.
    pub fn find_team_match(
        &mut self,
        game_id: &str,
        team_size: usize,
        now_ms: TimestampMs,
    ) -> Option<MatchRecord> {
        if team_size == 0 {
            return None;
        }
        let queue = self.queues.get_mut(game_id)?;
        let required = team_size * 2;
        if queue.len() < required {
            return None;
        }

        queue.sort_by(|a, b| b.rating.cmp(&a.rating));
        let drafted: Vec<QueueEntry> = queue.drain(..required).collect();

        let mut team_a = Vec::with_capacity(team_size);
        let mut team_b = Vec::with_capacity(team_size);
        let mut left_to_right = true;

        for (i, player) in drafted.into_iter().enumerate() {
            if left_to_right {
                if team_a.len() < team_size {
                    team_a.push(player);
                } else {
                    team_b.push(player);
                }
            } else if team_b.len() < team_size {
                team_b.push(player);
            } else {
                team_a.push(player);
            }

            if (i + 1) % team_size == 0 {
                left_to_right = !left_to_right;
            }
        }

        let team_a = Team {
            average_rating: average_rating(&team_a),
            players: team_a,
        };
        let team_b = Team {
            average_rating: average_rating(&team_b),
            players: team_b,
        };

        let record = MatchRecord {
            match_id: new_match_id(),
            game_id: game_id.to_string(),
            rating_difference: (team_a.average_rating - team_b.average_rating).abs(),
            shape: MatchShape::Teams {
                team_a,
                team_b,
                team_size,
            },
            created_at_ms: now_ms,
        };

        info!(game_id, match_id = %record.match_id, team_size, "team match formed");
        self.active_matches
            .insert(record.match_id.clone(), record.clone());
        Some(record)
    }

    /// Form a battle-royale lobby: up to `max_players` once
    /// `min_players` are waiting, no rating balancing.
    pub fn find_battle_royale_match(
        &mut self,
        game_id: &str,
        min_players: usize,
        max_players: usize,
        now_ms: TimestampMs,
    ) -> Option<MatchRecord> {
        let queue = self.queues.get_mut(game_id)?;
        if min_players == 0 || queue.len() < min_players {
            return None;
        }

        queue.sort_by_key(|e| e.queued_at_ms);
        let take = queue.len().min(max_players);
        let players: Vec<QueueEntry> = queue.drain(..take).collect();

        let spread = match (
            players.iter().map(|p| p.rating).max(),
            players.iter().map(|p| p.rating).min(),
        ) {
            (Some(max), Some(min)) => f64::from(max - min),
            _ => 0.0,
        };

        let record = MatchRecord {
            match_id: new_match_id(),
            game_id: game_id.to_string(),
            rating_difference: spread,
            shape: MatchShape::BattleRoyale {
                average_rating: average_rating(&players),
                players,
            },
            created_at_ms: now_ms,
        };

        info!(game_id, match_id = %record.match_id, "battle royale lobby formed");
        self.active_matches
            .insert(record.match_id.clone(), record.clone());
        Some(record)
    }

    /// End a match and apply rating updates.
    ///
    /// Duels get symmetric ELO deltas from the declared winner (or a
    /// draw when no winner is declared); team and battle-royale results
    /// are reported without rating movement.
    pub fn end_match(
        &mut self,
        match_id: &str,
        outcome: MatchOutcome,
        now_ms: TimestampMs,
    ) -> Result<MatchSummary, MatchmakerError> {
        let record = self
            .active_matches
            .remove(match_id)
            .ok_or_else(|| MatchmakerError::MatchNotFound(match_id.to_string()))?;

        let mut updates = Vec::new();

        if let MatchShape::Duel { players, .. } = &record.shape {
            let (a, b) = (&players[0], &players[1]);

            let (outcome_a, outcome_b) = match outcome.winner.as_deref() {
                Some(winner) if winner == a.address => (GameOutcome::Win, GameOutcome::Loss),
                Some(winner) if winner == b.address => (GameOutcome::Loss, GameOutcome::Win),
                _ => (GameOutcome::Draw, GameOutcome::Draw),
            };

            let change_a = elo_change(a.rating, b.rating, outcome_a.score(), DEFAULT_K_FACTOR);
            let change_b = elo_change(b.rating, a.rating, outcome_b.score(), DEFAULT_K_FACTOR);

            updates.push(self.apply_result(
                &a.address,
                outcome_a,
                change_a,
                outcome.duration_secs,
                now_ms,
            ));
            updates.push(self.apply_result(
                &b.address,
                outcome_b,
                change_b,
                outcome.duration_secs,
                now_ms,
            ));
        }

        info!(match_id, updates = updates.len(), "match ended");
        Ok(MatchSummary {
            match_id: match_id.to_string(),
            duration_secs: outcome.duration_secs,
            updates,
        })
    }

    /// Point-in-time queue summary for a game.
    pub fn queue_status(&self, game_id: &str, now_ms: TimestampMs) -> QueueStatus {
        let empty = Vec::new();
        let queue = self.queues.get(game_id).unwrap_or(&empty);

        let average_rating = if queue.is_empty() {
            0
        } else {
            (queue.iter().map(|e| i64::from(e.rating)).sum::<i64>() / queue.len() as i64) as i32
        };
        let oldest_wait_secs = queue
            .iter()
            .map(|e| now_ms.saturating_sub(e.queued_at_ms) / 1000)
            .max()
            .unwrap_or(0);

        QueueStatus {
            players_in_queue: queue.len(),
            estimated_wait_secs: self.estimate_wait(game_id),
            average_rating,
            oldest_wait_secs,
        }
    }

    /// Rough wait estimate: 30 seconds per queue position.
    pub fn estimate_wait(&self, game_id: &str) -> u64 {
        self.queues
            .get(game_id)
            .map(|q| q.len() as u64 * WAIT_SECS_PER_POSITION)
            .unwrap_or(0)
    }

    /// Number of matches formed but not yet ended.
    pub fn active_match_count(&self) -> usize {
        self.active_matches.len()
    }

    /// Look up an active match.
    pub fn get_match(&self, match_id: &str) -> Option<&MatchRecord> {
        self.active_matches.get(match_id)
    }

    /// Drop queue entries and active matches older than `max_age_ms`.
    /// Rating records are address-scoped and survive the sweep.
    pub fn cleanup(&mut self, max_age_ms: u64, now_ms: TimestampMs) -> usize {
        let mut removed = 0;

        for queue in self.queues.values_mut() {
            let before = queue.len();
            queue.retain(|e| now_ms.saturating_sub(e.queued_at_ms) <= max_age_ms);
            removed += before - queue.len();
        }
        self.queues.retain(|_, q| !q.is_empty());

        let before = self.active_matches.len();
        self.active_matches
            .retain(|_, m| now_ms.saturating_sub(m.created_at_ms) <= max_age_ms);
        removed + before - self.active_matches.len()
    }

    fn apply_result(
        &mut self,
        address: &str,
        outcome: GameOutcome,
        rating_change: i32,
        duration_secs: u64,
        now_ms: TimestampMs,
    ) -> PlayerStats {
        let stats = self
            .stats
            .entry(address.to_string())
            .or_insert_with(|| PlayerStats::new(address, now_ms));
        stats.apply_result(outcome, rating_change, duration_secs, now_ms);
        stats.clone()
    }
}

/// Rating window for a player who has waited `wait_ms`: the base window
/// plus 10 points per 30 seconds, capped at 300.
pub fn rating_window(wait_ms: u64) -> i32 {
    let steps = (wait_ms / 1000 / 30) as i32;
    (BASE_RATING_WINDOW + steps * WINDOW_GROWTH_PER_STEP).min(MAX_RATING_WINDOW)
}

/// Pairing quality: base 100, penalized by rating gap, rewarded for
/// shared region and mode, penalized for an immediate rematch.
fn match_score(anchor: &QueueEntry, candidate: &QueueEntry) -> f64 {
    let mut score = 100.0;

    score -= f64::from((anchor.rating - candidate.rating).abs()) / 5.0;

    if let (Some(a), Some(b)) = (&anchor.preferences.region, &candidate.preferences.region) {
        if a == b {
            score += 20.0;
        }
    }

    if let (Some(a), Some(b)) = (&anchor.preferences.mode, &candidate.preferences.mode) {
        if a == b {
            score += 10.0;
        }
    }

    if anchor
        .recent_opponents
        .iter()
        .any(|o| o == &candidate.address)
    {
        score -= 15.0;
    }

    score.max(0.0)
}

fn average_rating(players: &[QueueEntry]) -> f64 {
    if players.is_empty() {
        return 0.0;
    }
    players.iter().map(|p| f64::from(p.rating)).sum::<f64>() / players.len() as f64
}

fn new_match_id() -> String {
    format!("match_{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T0: TimestampMs = 1_700_000_000_000;

    fn profile(address: &str) -> PlayerProfile {
        PlayerProfile {
            address: address.to_string(),
            ..PlayerProfile::default()
        }
    }

    /// Seed an address with a specific rating by crediting the delta as
    /// a single applied result.
    fn seed_rating(mm: &mut Matchmaker, address: &str, rating: i32) {
        mm.player_stats(address, T0);
        let delta = rating - DEFAULT_RATING_I32;
        if delta != 0 {
            mm.apply_result(address, GameOutcome::Draw, delta, 0, T0);
        }
    }

    const DEFAULT_RATING_I32: i32 = crate::matchmaker::rating::DEFAULT_RATING;

    #[test]
    fn test_rating_window_growth_and_cap() {
        assert_eq!(rating_window(0), 50);
        assert_eq!(rating_window(29_000), 50);
        assert_eq!(rating_window(30_000), 60);
        assert_eq!(rating_window(90_000), 80);
        // 1350s of waiting would want a 500 window, but the cap holds.
        assert_eq!(rating_window(1_350_000), 300);
        assert_eq!(rating_window(u64::MAX / 2), 300);
    }

    #[test]
    fn test_close_ratings_match_immediately() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        seed_rating(&mut mm, "bob", 1030);

        let receipt = mm.join_queue("game1", profile("alice"), T0).unwrap();
        assert!(receipt.matched.is_none());

        let receipt = mm.join_queue("game1", profile("bob"), T0).unwrap();
        let record = receipt.matched.expect("30 points is inside the base window");
        assert_eq!(record.rating_difference, 30.0);
        assert_eq!(receipt.position, 0);
        assert_eq!(mm.active_match_count(), 1);

        match &record.shape {
            MatchShape::Duel { players, .. } => {
                assert_eq!(players.len(), 2);
            }
            other => panic!("expected duel, got {other:?}"),
        }
    }

    #[test]
    fn test_distant_ratings_do_not_match_at_base_window() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        seed_rating(&mut mm, "smurf", 500);

        mm.join_queue("game1", profile("alice"), T0).unwrap();
        let receipt = mm.join_queue("game1", profile("smurf"), T0).unwrap();
        assert!(receipt.matched.is_none());

        // Even past the window cap a 500-point gap stays unmatched.
        assert!(mm.find_match("game1", T0 + 2_000_000).is_none());

        // A closer-rated third player pairs with the anchor instead.
        seed_rating(&mut mm, "carol", 1040);
        let receipt = mm
            .join_queue("game1", profile("carol"), T0 + 2_000_000)
            .unwrap();
        let record = receipt.matched.expect("carol is within the window");
        match &record.shape {
            MatchShape::Duel { players, .. } => {
                let addresses: Vec<&str> =
                    players.iter().map(|p| p.address.as_str()).collect();
                assert!(addresses.contains(&"alice"));
                assert!(addresses.contains(&"carol"));
            }
            other => panic!("expected duel, got {other:?}"),
        }
    }

    #[test]
    fn test_window_widens_with_wait() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        seed_rating(&mut mm, "bob", 1150);

        mm.join_queue("game1", profile("alice"), T0).unwrap();
        mm.join_queue("game1", profile("bob"), T0).unwrap();

        // 150-point gap: outside the base 50 window.
        assert!(mm.find_match("game1", T0).is_none());

        // After 5 minutes the window is 150.
        assert!(mm.find_match("game1", T0 + 300_000).is_some());
    }

    #[test]
    fn test_preferences_break_ties() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "anchor", 1000);
        seed_rating(&mut mm, "stranger", 1100);
        seed_rating(&mut mm, "neighbor", 1100);

        let mut anchor = profile("anchor");
        anchor.preferences.region = Some("eu".into());
        let stranger = profile("stranger");
        let mut neighbor = profile("neighbor");
        neighbor.preferences.region = Some("eu".into());

        // 100-point gaps keep everyone queued at the base window.
        mm.join_queue("game1", anchor, T0).unwrap();
        assert!(mm.join_queue("game1", stranger, T0 + 1).unwrap().matched.is_none());
        assert!(mm.join_queue("game1", neighbor, T0 + 2).unwrap().matched.is_none());

        // Three minutes later both candidates fit; the shared region
        // outweighs identical rating gaps.
        let record = mm.find_match("game1", T0 + 180_000).unwrap();
        match &record.shape {
            MatchShape::Duel { players, match_score } => {
                assert!(players.iter().any(|p| p.address == "neighbor"));
                assert_eq!(*match_score, 100.0);
            }
            other => panic!("expected duel, got {other:?}"),
        }
    }

    #[test]
    fn test_recent_opponent_penalized() {
        let mut mm = Matchmaker::new();
        for address in ["anchor", "rematch", "fresh"] {
            seed_rating(&mut mm, address, 1000);
        }

        let mut anchor = profile("anchor");
        anchor.recent_opponents = vec!["rematch".to_string()];

        mm.join_queue("game1", anchor, T0).unwrap();
        mm.join_queue("game1", profile("rematch"), T0 + 1).unwrap();
        let receipt = mm.join_queue("game1", profile("fresh"), T0 + 2).unwrap();

        let record = receipt.matched.unwrap();
        match &record.shape {
            MatchShape::Duel { players, .. } => {
                assert!(players.iter().any(|p| p.address == "fresh"));
                assert!(!players.iter().any(|p| p.address == "rematch"));
            }
            other => panic!("expected duel, got {other:?}"),
        }
    }

    #[test]
    fn test_double_queue_rejected() {
        let mut mm = Matchmaker::new();
        mm.join_queue("game1", profile("alice"), T0).unwrap();
        assert!(matches!(
            mm.join_queue("game1", profile("alice"), T0 + 1),
            Err(MatchmakerError::AlreadyQueued { .. })
        ));
        // A different game's queue is independent.
        assert!(mm.join_queue("game2", profile("alice"), T0 + 2).is_ok());
    }

    #[test]
    fn test_leave_queue() {
        let mut mm = Matchmaker::new();
        mm.join_queue("game1", profile("alice"), T0).unwrap();
        assert!(mm.leave_queue("game1", "alice"));
        assert!(!mm.leave_queue("game1", "alice"));

        // Gone from matching
        mm.join_queue("game1", profile("bob"), T0 + 1).unwrap();
        assert!(mm.find_match("game1", T0 + 2).is_none());
    }

    #[test]
    fn test_team_match_draft_order() {
        let mut mm = Matchmaker::new();
        let ratings = [("p1", 2000), ("p2", 1800), ("p3", 1600), ("p4", 1400)];
        for (address, rating) in ratings {
            seed_rating(&mut mm, address, rating);
            mm.join_queue("arena", profile(address), T0).unwrap();
        }

        let record = mm.find_team_match("arena", 2, T0 + 1).unwrap();
        match &record.shape {
            MatchShape::Teams { team_a, team_b, team_size } => {
                assert_eq!(*team_size, 2);
                let a: Vec<&str> = team_a.players.iter().map(|p| p.address.as_str()).collect();
                let b: Vec<&str> = team_b.players.iter().map(|p| p.address.as_str()).collect();
                // Rating-descending draft, sides switching every
                // team_size picks.
                assert_eq!(a, vec!["p1", "p2"]);
                assert_eq!(b, vec!["p3", "p4"]);
                assert_eq!(team_a.average_rating, 1900.0);
                assert_eq!(team_b.average_rating, 1500.0);
            }
            other => panic!("expected teams, got {other:?}"),
        }

        // Queue drained
        assert_eq!(mm.queue_status("arena", T0 + 1).players_in_queue, 0);
    }

    #[test]
    fn test_team_match_requires_full_roster() {
        let mut mm = Matchmaker::new();
        for address in ["p1", "p2", "p3"] {
            mm.join_queue("arena", profile(address), T0).unwrap();
        }
        assert!(mm.find_team_match("arena", 2, T0).is_none());
        assert_eq!(mm.queue_status("arena", T0).players_in_queue, 3);
    }

    #[test]
    fn test_battle_royale_lobby() {
        let mut mm = Matchmaker::new();
        // Ratings far enough apart that no duel forms on join.
        for i in 0..5u64 {
            seed_rating(&mut mm, &format!("p{i}"), 1000 + i as i32 * 1000);
            mm.join_queue("br", profile(&format!("p{i}")), T0 + i).unwrap();
        }

        assert!(mm.find_battle_royale_match("br", 8, 10, T0 + 10).is_none());

        let record = mm.find_battle_royale_match("br", 4, 4, T0 + 10).unwrap();
        match &record.shape {
            MatchShape::BattleRoyale { players, .. } => {
                // Longest-waiting players get the lobby.
                let addresses: Vec<&str> =
                    players.iter().map(|p| p.address.as_str()).collect();
                assert_eq!(addresses, vec!["p0", "p1", "p2", "p3"]);
            }
            other => panic!("expected battle royale, got {other:?}"),
        }
        assert_eq!(mm.queue_status("br", T0 + 10).players_in_queue, 1);
    }

    #[test]
    fn test_end_match_applies_symmetric_elo() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        seed_rating(&mut mm, "bob", 1030);

        mm.join_queue("game1", profile("alice"), T0).unwrap();
        let record = mm
            .join_queue("game1", profile("bob"), T0)
            .unwrap()
            .matched
            .unwrap();

        let summary = mm
            .end_match(
                &record.match_id,
                MatchOutcome {
                    winner: Some("alice".to_string()),
                    duration_secs: 420,
                },
                T0 + 500_000,
            )
            .unwrap();

        assert_eq!(summary.updates.len(), 2);
        let alice = mm.get_player_stats("alice").unwrap();
        let bob = mm.get_player_stats("bob").unwrap();

        let expected = elo_change(1000, 1030, 1.0, DEFAULT_K_FACTOR);
        assert_eq!(alice.rating, 1000 + expected);
        assert_eq!(bob.rating, 1030 - expected);
        assert_eq!(alice.wins, 1);
        assert_eq!(alice.win_streak, 1);
        assert_eq!(bob.losses, 1);
        assert_eq!(alice.average_game_duration_secs, 420);

        // Match removed from the active set.
        assert_eq!(mm.active_match_count(), 0);
        assert!(matches!(
            mm.end_match(
                &record.match_id,
                MatchOutcome { winner: None, duration_secs: 0 },
                T0
            ),
            Err(MatchmakerError::MatchNotFound(_))
        ));
    }

    #[test]
    fn test_end_match_draw() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        seed_rating(&mut mm, "bob", 1000);

        mm.join_queue("game1", profile("alice"), T0).unwrap();
        let record = mm
            .join_queue("game1", profile("bob"), T0)
            .unwrap()
            .matched
            .unwrap();

        mm.end_match(
            &record.match_id,
            MatchOutcome {
                winner: None,
                duration_secs: 300,
            },
            T0 + 1,
        )
        .unwrap();

        assert_eq!(mm.get_player_stats("alice").unwrap().rating, 1000);
        assert_eq!(mm.get_player_stats("alice").unwrap().draws, 1);
        assert_eq!(mm.get_player_stats("bob").unwrap().draws, 1);
    }

    #[test]
    fn test_queue_status() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1200);
        seed_rating(&mut mm, "smurf", 600);
        mm.join_queue("game1", profile("alice"), T0).unwrap();
        mm.join_queue("game1", profile("smurf"), T0 + 60_000).unwrap();

        let status = mm.queue_status("game1", T0 + 120_000);
        assert_eq!(status.players_in_queue, 2);
        assert_eq!(status.average_rating, 900);
        assert_eq!(status.oldest_wait_secs, 120);
        assert_eq!(status.estimated_wait_secs, 60);

        let empty = mm.queue_status("nothing", T0);
        assert_eq!(empty.players_in_queue, 0);
        assert_eq!(empty.average_rating, 0);
    }

    #[test]
    fn test_cleanup_sweeps_queues_and_matches() {
        let mut mm = Matchmaker::new();
        seed_rating(&mut mm, "alice", 1000);
        mm.join_queue("game1", profile("alice"), T0).unwrap();

        mm.join_queue("game2", profile("bob"), T0).unwrap();
        let record = mm
            .join_queue("game2", profile("carol"), T0)
            .unwrap()
            .matched
            .unwrap();
        assert_eq!(mm.active_match_count(), 1);

        let removed = mm.cleanup(3_600_000, T0 + 3_600_001);
        assert_eq!(removed, 2); // one queue entry + one match
        assert_eq!(mm.active_match_count(), 0);
        assert!(mm.get_match(&record.match_id).is_none());
        // Ratings survive.
        assert!(mm.get_player_stats("alice").is_some());
    }
}
