//! Playfair Engine Demo
//!
//! Drives one full session end to end: matchmaking, a committed RNG
//! session, state commits, anti-cheat telemetry, replay recording and
//! post-session verification.

use anyhow::Result;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use playfair::anticheat::engine::{CombatStats, MovementSample};
use playfair::core::value::StateValue;
use playfair::fairness::rng::{create_verification_package, RollClaim};
use playfair::matchmaker::engine::{MatchOutcome, MatchShape, PlayerProfile};
use playfair::matchmaker::rating::rank_division;
use playfair::replay::playback::PlaybackUpdate;
use playfair::SessionRegistry;
use playfair::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Playfair Engine v{}", VERSION);

    let mut registry = SessionRegistry::new();
    let now = SessionRegistry::now_ms();

    // --- Matchmaking -------------------------------------------------------
    registry.matchmaker().join_queue(
        "arena",
        PlayerProfile {
            address: "alice".into(),
            ..PlayerProfile::default()
        },
        now,
    )?;
    let receipt = registry.matchmaker().join_queue(
        "arena",
        PlayerProfile {
            address: "bob".into(),
            ..PlayerProfile::default()
        },
        now,
    )?;

    let formed = receipt.matched.expect("equal ratings match immediately");
    let players: Vec<String> = match &formed.shape {
        MatchShape::Duel { players, .. } => players.iter().map(|p| p.address.clone()).collect(),
        _ => unreachable!("two queued players form a duel"),
    };
    info!(match_id = %formed.match_id, ?players, "match formed");

    // --- Session -----------------------------------------------------------
    let session_id = format!("session_{}", formed.match_id);
    let initial = StateValue::map_from([
        ("round", StateValue::from(1i64)),
        ("scores", StateValue::map()),
    ]);
    let opened = registry.open_session(&session_id, &players, initial, now);
    info!(commitment = %opened.rng_commitment, "RNG commitment published");

    // A few provably fair rolls, committed to state and the replay.
    let mut claims = Vec::new();
    let client_seed = registry
        .rng_session(&session_id)
        .expect("session just opened")
        .client_seed
        .clone();

    for turn in 0..5u64 {
        let at = now + 500 * (turn + 1);

        let roll = registry
            .rng_session(&session_id)
            .expect("session open")
            .roll(1, 6)?;
        claims.push(RollClaim {
            nonce: roll.nonce,
            result: roll.result,
            min: 1,
            max: 6,
        });

        registry.state_sync().update_state(
            &session_id,
            StateValue::map_from([("last_roll", StateValue::from(roll.result))]),
            Some("server"),
            at,
        )?;
        registry.replays().record_action(
            &session_id,
            &players[(turn % 2) as usize],
            "roll",
            StateValue::map_from([("value", StateValue::from(roll.result))]),
            at,
        )?;
    }

    // Telemetry: one clean movement, one blatant speed hack.
    registry.anticheat().detect_speed_hack(
        &session_id,
        "alice",
        MovementSample { x: 0.0, y: 0.0, z: 0.0, timestamp_ms: now + 1000 },
        10.0,
    )?;
    let outcome = registry.anticheat().detect_speed_hack(
        &session_id,
        "alice",
        MovementSample { x: 200.0, y: 0.0, z: 0.0, timestamp_ms: now + 2000 },
        10.0,
    )?;
    if outcome.detected {
        warn!(speed = ?outcome.speed, "speed hack flagged");
    }
    registry.anticheat().detect_aim_assist(
        &session_id,
        "bob",
        CombatStats {
            headshot_percentage: 42.0,
            hit_rate: 55.0,
            wall_tracking_score: 0.1,
        },
        now + 2500,
    )?;

    registry.replays().record_event(
        &session_id,
        playfair::replay::recorder::EventKind::MatchWon,
        StateValue::map_from([("winner", StateValue::from("alice"))]),
        now + 3000,
    )?;

    // --- Close and verify --------------------------------------------------
    let summary = registry.matchmaker().end_match(
        &formed.match_id,
        MatchOutcome {
            winner: Some("alice".into()),
            duration_secs: 3,
        },
        now + 3000,
    )?;
    for stats in &summary.updates {
        info!(
            address = %stats.address,
            rating = stats.rating,
            division = %rank_division(stats.rating).name(),
            "rating updated"
        );
    }

    let closed = registry.close_session(&session_id, StateValue::Null, now + 3500)?;
    info!(
        violations = closed.report.violations.len(),
        events = closed.replay.event_count,
        state_version = closed.state.state.version,
        "session closed"
    );

    let package =
        create_verification_package(&closed.revealed_server_seed, &client_seed, &claims)?;
    info!(all_valid = package.all_valid, rolls = package.results.len(), "rolls re-verified");

    // --- Replay playback ---------------------------------------------------
    let (controller, mut updates) = registry
        .replays()
        .play_replay(&closed.replay.replay_id, 5.0)?;
    controller.play();

    while let Some(update) = updates.recv().await {
        match update {
            PlaybackUpdate::Event { index, event } => {
                info!(index, kind = %event.kind, "replayed event");
            }
            PlaybackUpdate::Completed => {
                info!("playback complete");
                break;
            }
        }
    }

    Ok(())
}
