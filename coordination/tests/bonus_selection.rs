//! Bonus selection tests: one `(round, stage)` per player, drawn uniformly
//! and independently across players.

use std::collections::HashMap;
use std::sync::Arc;

use coordination::agent::PolicyAgent;
use coordination::{
    EventBus, GroupCoordinator, GroupReport, HeuristicStrategy, RoundRecord, ScoringEngine, Seat, SessionConfig,
    SlotId, Stage,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

async fn play(rounds: u32, intertrial_ms: Option<[u64; 2]>) -> GroupReport {
    let config = SessionConfig {
        total_rounds: Some(rounds),
        min_block_len: Some(2),
        max_block_len: Some(2),
        seed: 3,
        intertrial_ms,
        ..SessionConfig::default()
    };
    let strategies = [
        HeuristicStrategy::Standard,
        HeuristicStrategy::RiskTaking,
        HeuristicStrategy::SocialFollower,
        HeuristicStrategy::Random,
        HeuristicStrategy::Random,
    ];
    let seats = strategies
        .into_iter()
        .enumerate()
        .map(|(i, s)| Seat::automated(Box::new(PolicyAgent::new(format!("bot-{i}"), s, i as u64))))
        .collect();
    let coordinator = GroupCoordinator::new(1, 0, Arc::new(config), seats, EventBus::new().shared()).unwrap();
    coordinator.run().await.unwrap()
}

async fn played_rounds(rounds: u32) -> Vec<RoundRecord> {
    play(rounds, None).await.records
}

#[tokio::test(start_paused = true)]
async fn test_bonus_matches_recorded_delta() {
    let records = played_rounds(4).await;
    let engine = ScoringEngine::default();
    let mut rng = StdRng::seed_from_u64(9);
    let outcome = engine.select_bonus_outcomes(1, &records, &mut rng);

    assert_eq!(outcome.rounds_played, 4);
    assert_eq!(outcome.players.len(), 5);
    for player in &outcome.players {
        let bonus = player.bonus.unwrap();
        let record = records.iter().find(|r| r.round == bonus.round).unwrap();
        assert_eq!(bonus.bonus_delta, record.player(player.slot).unwrap().delta(bonus.stage));

        let first: i32 = records.iter().map(|r| r.player(player.slot).unwrap().first_delta).sum();
        let second: i32 = records.iter().map(|r| r.player(player.slot).unwrap().second_delta).sum();
        assert_eq!(player.first_stage_total, first);
        assert_eq!(player.second_stage_total, second);
    }
}

#[tokio::test(start_paused = true)]
async fn test_intertrial_pauses_do_not_move_bonus_draws() {
    let immediate = play(6, None).await;
    let paced = play(6, Some([3_000, 4_000])).await;

    assert_eq!(immediate.records.len(), paced.records.len());
    let decisions = |report: &GroupReport| -> Vec<_> {
        report
            .records
            .iter()
            .flat_map(|r| &r.players)
            .map(|p| (p.first_choice.value, p.first_bet.value, p.second_choice.value, p.second_bet.value))
            .collect()
    };
    assert_eq!(decisions(&immediate), decisions(&paced));
    assert_eq!(immediate.outcome, paced.outcome);
}

#[test]
fn test_no_rounds_means_no_bonus() {
    let engine = ScoringEngine::default();
    let mut rng = StdRng::seed_from_u64(1);
    let outcome = engine.select_bonus_outcomes(2, &[], &mut rng);
    assert_eq!(outcome.rounds_played, 0);
    assert!(outcome.players.iter().all(|p| p.bonus.is_none()));
}

/// Every `(round, stage)` cell comes up about equally often.
#[tokio::test(start_paused = true)]
async fn prop_bonus_cells_are_uniform() {
    const DRAWS: u32 = 8_000;
    let records = played_rounds(4).await;
    let engine = ScoringEngine::default();
    let mut rng = StdRng::seed_from_u64(2024);

    let mut cells: HashMap<(u32, Stage), u32> = HashMap::new();
    let mut all_same = 0u32;
    for _ in 0..DRAWS {
        let outcome = engine.select_bonus_outcomes(1, &records, &mut rng);
        let picks: Vec<(u32, Stage)> = outcome
            .players
            .iter()
            .map(|p| p.bonus.map(|b| (b.round, b.stage)).unwrap())
            .collect();
        if picks.iter().all(|p| *p == picks[0]) {
            all_same += 1;
        }
        for pick in picks {
            *cells.entry(pick).or_insert(0) += 1;
        }
    }

    // 4 rounds x 2 stages, 5 players per draw.
    assert_eq!(cells.len(), 8);
    let expected = f64::from(DRAWS * 5) / 8.0;
    for (cell, count) in &cells {
        let ratio = f64::from(*count) / expected;
        assert!((0.92..1.08).contains(&ratio), "cell {cell:?} drawn {count} times");
    }
    // Independent draws almost never agree across all five players.
    assert!(f64::from(all_same) / f64::from(DRAWS) < 0.01);
}

#[tokio::test(start_paused = true)]
async fn test_player_lookup() {
    let records = played_rounds(2).await;
    let outcome = ScoringEngine::new(10).select_bonus_outcomes(1, &records, &mut StdRng::seed_from_u64(4));
    let slot = SlotId::new(4).unwrap();
    assert_eq!(outcome.player(slot).map(|p| p.slot), Some(slot));
    // Deltas were scored with the coordinator's unit, not the engine's.
    let bonus = outcome.player(slot).unwrap().bonus.unwrap();
    assert_eq!(bonus.bonus_delta.abs() % 20, 0);
}
