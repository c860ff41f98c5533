//! Session runner tests: many groups in parallel, matching and reproducible
//! artifacts.

use std::time::Duration;

use coordination::group::{Occupant, Participant};
use coordination::{
    EventBus, HeuristicSeats, ResponseOrigin, SessionConfig, SessionRunner, SlotConfig, StrategyKind, TaskMode,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

fn config() -> SessionConfig {
    SessionConfig {
        session_id: "runner".into(),
        total_rounds: Some(20),
        min_block_len: Some(4),
        max_block_len: Some(6),
        seed: 77,
        slots: vec![
            SlotConfig::automated(StrategyKind::Standard),
            SlotConfig::automated(StrategyKind::RiskTaking),
            SlotConfig::automated(StrategyKind::SocialFollower),
            SlotConfig::automated(StrategyKind::Random),
            SlotConfig {
                strategy: StrategyKind::SocialFollower,
                ..SlotConfig::human()
            },
        ],
        ..SessionConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_unattended_groups_run_in_parallel() {
    let bus = EventBus::with_history().shared();
    let runner = SessionRunner::new(config(), bus.clone()).unwrap();
    let reports = runner.run_unattended(3, &HeuristicSeats { seed: 1 }).await.unwrap();

    assert_eq!(reports.iter().map(|r| r.group).collect::<Vec<_>>(), vec![1, 2, 3]);
    for report in &reports {
        assert_eq!(report.records.len(), 20);
        assert_eq!(report.outcome.group, report.group);
        assert_eq!(report.aggregates.count(ResponseOrigin::Automated), 20 * 5 * 4);
        assert_eq!(report.aggregates.fallbacks(), 0);
    }
    // Each group draws its own schedule.
    assert_ne!(reports[0].schedule.seed, reports[1].schedule.seed);

    let completed = bus
        .history()
        .iter()
        .filter(|e| e.event_type() == "group_completed")
        .count();
    assert_eq!(completed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_reproduces_outcomes() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let runner = SessionRunner::new(config(), EventBus::new().shared()).unwrap();
        runs.push(runner.run_unattended(2, &HeuristicSeats { seed: 4 }).await.unwrap());
    }

    for (a, b) in runs[0].iter().zip(&runs[1]) {
        assert_eq!(a.schedule, b.schedule);
        assert_eq!(a.outcome, b.outcome);
        for (ra, rb) in a.records.iter().zip(&b.records) {
            for (pa, pb) in ra.players.iter().zip(&rb.players) {
                assert_eq!(pa.first_choice.value, pb.first_choice.value);
                assert_eq!(pa.second_bet.value, pb.second_bet.value);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_practice_session_has_no_reversals() {
    let config = SessionConfig {
        mode: TaskMode::Practice,
        ..SessionConfig::default()
    };
    let runner = SessionRunner::new(config, EventBus::new().shared()).unwrap();
    let reports = runner.run_unattended(1, &HeuristicSeats { seed: 0 }).await.unwrap();

    assert_eq!(reports[0].records.len(), 5);
    assert!(reports[0].schedule.reversal_rounds().is_empty());
    assert!(reports[0].records.iter().all(|r| r.favored == reports[0].records[0].favored));
}

#[tokio::test(start_paused = true)]
async fn test_waiting_room_seats_arrivals_then_times_out() {
    let runner = SessionRunner::new(config(), EventBus::new().shared()).unwrap();
    let room = runner.waiting_room();
    assert_eq!(room.human_seats(), 1);

    let (tx, mut rx) = mpsc::channel(4);
    let started = Instant::now();
    let plans = room.assemble(&mut rx).await;
    assert_eq!(started.elapsed(), Duration::from_millis(15_000));
    assert!(matches!(
        plans[4].occupant,
        Occupant::Automated {
            strategy: StrategyKind::SocialFollower,
            ..
        }
    ));

    tx.send(Participant { id: "p-1".into() }).await.unwrap();
    let plans = room.assemble(&mut rx).await;
    assert_eq!(
        plans[4].occupant,
        Occupant::Human {
            participant: "p-1".into()
        }
    );

    let group = runner.form_group(0, plans, &HeuristicSeats { seed: 0 }).unwrap();
    assert_eq!(group.group(), 1);
    assert_eq!(
        group.slot_kinds().iter().filter(|k| **k == coordination::AgentKind::Human).count(),
        1
    );
}

#[test]
fn test_invalid_config_rejected_before_any_group_forms() {
    let config = SessionConfig {
        total_rounds: Some(7),
        min_block_len: Some(4),
        max_block_len: Some(5),
        ..SessionConfig::default()
    };
    assert!(SessionRunner::new(config, EventBus::new().shared()).is_err());
}
