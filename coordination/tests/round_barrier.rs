//! Round barrier tests: phase deadlines, timeout fallbacks, reveal contents
//! and information hiding, run on a paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coordination::agent::{Decision, DecisionValue, PolicyAgent};
use coordination::events::EventFilter;
use coordination::round::SlotView;
use coordination::{
    AgentError, AgentKind, Bet, Choice, DecisionAgent, DecisionPhase, DecisionProvider, EventBus,
    GroupCoordinator, GroupReport, HeuristicStrategy, ProviderAgent, ProviderError, ProviderRequest,
    ProviderResponse, ResponseOrigin, RoundPhase, Seat, SessionConfig, SessionEvent, SharedEventBus,
    SlotId, VisibleRoundState,
};
use tokio::time::Instant;

fn short_config(rounds: u32) -> SessionConfig {
    SessionConfig {
        total_rounds: Some(rounds),
        min_block_len: Some(1),
        max_block_len: Some(2),
        seed: 11,
        missed_phase_limit: None,
        ..SessionConfig::default()
    }
}

fn bot(i: u64, strategy: HeuristicStrategy) -> Seat {
    Seat::automated(Box::new(PolicyAgent::new(format!("bot-{i}"), strategy, i)))
}

fn slot(n: u8) -> SlotId {
    SlotId::new(n).unwrap()
}

async fn run_group(config: SessionConfig, seats: Vec<Seat>) -> (GroupReport, SharedEventBus) {
    let bus = EventBus::with_history().shared();
    let coordinator = GroupCoordinator::new(1, 0, Arc::new(config), seats, bus.clone()).unwrap();
    let report = coordinator.run().await.unwrap();
    (report, bus)
}

/// Four bots and one human who never answers.
fn four_bots_and_a_silent_human() -> Vec<Seat> {
    vec![
        bot(1, HeuristicStrategy::Standard),
        bot(2, HeuristicStrategy::RiskTaking),
        bot(3, HeuristicStrategy::SocialFollower),
        bot(4, HeuristicStrategy::Random),
        Seat::human("silent"),
    ]
}

// ── Barrier ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_four_of_five_close_at_deadline() {
    let (report, bus) = run_group(short_config(2), four_bots_and_a_silent_human()).await;

    assert_eq!(report.records.len(), 2);
    for record in &report.records {
        for n in 1..=4 {
            let player = record.player(slot(n)).unwrap();
            assert_eq!(player.origins(), [ResponseOrigin::Automated; 4]);
        }
        let silent = record.player(slot(5)).unwrap();
        assert_eq!(silent.origins(), [ResponseOrigin::TimeoutFallback; 4]);
        assert!(silent.first_choice.latency_ms >= 3_000);

        // Each decision barrier waited the full deadline.
        let barriers: Vec<_> = record
            .transitions
            .iter()
            .filter(|t| t.reason.as_deref() == Some("deadline elapsed"))
            .collect();
        assert_eq!(barriers.len(), 4);
    }

    let closed = bus.replay(&EventFilter::new().types(vec!["phase_closed"]));
    assert_eq!(closed.len(), 8);
    for event in closed {
        let SessionEvent::PhaseClosed { timed_out, .. } = event else {
            panic!("filter returned {event:?}");
        };
        assert_eq!(timed_out, 1);
    }
    assert_eq!(report.aggregates.count(ResponseOrigin::TimeoutFallback), 8);
}

#[tokio::test(start_paused = true)]
async fn test_all_bots_close_without_waiting() {
    let seats = (1..=5).map(|i| bot(i, HeuristicStrategy::Standard)).collect();
    let started = Instant::now();
    let (report, _) = run_group(short_config(3), seats).await;

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(report.aggregates.fallbacks(), 0);
    for record in &report.records {
        assert!(record
            .transitions
            .iter()
            .all(|t| t.reason.as_deref() != Some("deadline elapsed")));
        assert_eq!(record.transitions.last().map(|t| t.to), Some(RoundPhase::Closed));
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_human_is_substituted_after_missed_limit() {
    let config = SessionConfig {
        missed_phase_limit: Some(2),
        ..short_config(2)
    };
    let (report, bus) = run_group(config, four_bots_and_a_silent_human()).await;

    let silent = report.records[0].player(slot(5)).unwrap();
    assert_eq!(
        silent.origins(),
        [
            ResponseOrigin::TimeoutFallback,
            ResponseOrigin::TimeoutFallback,
            ResponseOrigin::AgentSubstituted,
            ResponseOrigin::AgentSubstituted,
        ]
    );
    let substituted = bus.replay(&EventFilter::new().types(vec!["slot_substituted"]));
    assert_eq!(substituted.len(), 1);
    assert_eq!(substituted[0].round(), Some(1));
}

// ── Scoring and reveals ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_rewarded_option_shared_and_scored() {
    let (report, _) = run_group(short_config(4), four_bots_and_a_silent_human()).await;

    for (record, spec) in report.records.iter().zip(&report.schedule.rounds) {
        assert_eq!(record.rewarded, spec.rewarded);
        for player in &record.players {
            assert_eq!(player.first_correct, player.first_choice.value == record.rewarded);
            assert_eq!(player.second_correct, player.second_choice.value == record.rewarded);
            let expected = i32::from(player.second_bet.value.get()) * 20;
            assert_eq!(
                player.second_delta,
                if player.second_correct { expected } else { -expected }
            );
            assert_eq!(player.switched, player.first_choice.value != player.second_choice.value);
            assert_eq!(player.first_agreement.with + player.first_agreement.against, 4);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_reveals_carry_only_released_information() {
    let (report, bus) = run_group(short_config(2), four_bots_and_a_silent_human()).await;

    for record in &report.records {
        let reveals: Vec<_> = bus
            .replay(&EventFilter::new().round(record.round).types(vec!["reveal"]))
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Reveal(broadcast) => Some(broadcast),
                _ => None,
            })
            .collect();
        assert_eq!(reveals.len(), 2);
        assert_eq!(reveals[0].phase, RoundPhase::Reveal1);
        assert_eq!(reveals[1].phase, RoundPhase::Reveal2);

        for player in &record.players {
            let Some(SlotView::First(first)) = reveals[0].view_for(player.slot) else {
                panic!("missing first reveal for slot {}", player.slot);
            };
            assert_eq!(first.own_choice, player.first_choice.value);
            assert_eq!(first.own_bet, player.first_bet.value);
            assert_eq!(first.peers.len(), 4);
            assert!(first.peers.iter().all(|p| p.slot != player.slot));
            for peer in &first.peers {
                assert_eq!(peer.choice, record.player(peer.slot).unwrap().first_choice.value);
            }

            let Some(SlotView::Second(second)) = reveals[1].view_for(player.slot) else {
                panic!("missing second reveal for slot {}", player.slot);
            };
            assert_eq!(second.own_delta, player.second_delta);
            for peer in &second.peers {
                let other = record.player(peer.slot).unwrap();
                assert_eq!(peer.choice, other.second_choice.value);
                assert_eq!(peer.correct, other.second_correct);
            }
        }

        // Nothing on the wire names a peer's bet or delta.
        let first_json = serde_json::to_value(&reveals[0]).unwrap();
        for view in first_json["views"].as_array().unwrap() {
            for peer in view["peers"].as_array().unwrap() {
                assert!(peer.get("bet").is_none());
            }
            assert!(view.get("own_delta").is_none());
        }
        let second_json = serde_json::to_value(&reveals[1]).unwrap();
        for view in second_json["views"].as_array().unwrap() {
            for peer in view["peers"].as_array().unwrap() {
                assert!(peer.get("bet").is_none());
                assert!(peer.get("delta").is_none());
            }
        }
    }
}

// ── Information hiding inside the round ────────────────────────────

/// Records every view it is shown and always answers A / 2.
struct Spy {
    seen: Arc<Mutex<Vec<VisibleRoundState>>>,
}

#[async_trait]
impl DecisionAgent for Spy {
    fn kind(&self) -> AgentKind {
        AgentKind::Automated
    }

    fn label(&self) -> &str {
        "spy"
    }

    async fn observe(&mut self, view: &VisibleRoundState) {
        self.seen.lock().unwrap().push(view.clone());
    }

    async fn decide(&mut self, phase: DecisionPhase, _deadline: Instant) -> Result<Decision, AgentError> {
        Ok(Decision::primary(if phase.expects_choice() {
            DecisionValue::Choice(Choice::A)
        } else {
            DecisionValue::Bet(Bet::MEDIUM)
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn test_peer_choices_hidden_until_first_reveal() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut seats = vec![Seat::automated(Box::new(Spy { seen: seen.clone() }))];
    seats.extend((2..=5).map(|i| bot(i, HeuristicStrategy::Random)));
    let (report, _) = run_group(short_config(2), seats).await;

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    for view in seen.iter() {
        match view.phase {
            RoundPhase::AwaitFirstChoice | RoundPhase::AwaitFirstBet => {
                assert!(view.peer_first_choices.is_empty(), "round {} {}", view.round, view.phase);
            }
            _ => assert_eq!(view.peer_first_choices.len(), 4),
        }
        if view.phase == RoundPhase::AwaitFirstChoice {
            assert_eq!(view.own_first_choice, None);
            assert_eq!(view.history.len() as u32, view.round - 1);
        }
        if view.phase == RoundPhase::AwaitSecondChoice {
            assert_eq!(view.own_first_bet, Some(Bet::MEDIUM));
            assert_eq!(view.own_second_choice, None);
        }
    }

    // History only ever holds rounds that already closed.
    let last = seen.last().unwrap();
    assert_eq!(last.phase, RoundPhase::Reveal2);
    assert_eq!(last.history.len(), report.records.len());
}

/// Answers at once but takes ten minutes to look at each reveal.
struct SlowReader;

#[async_trait]
impl DecisionAgent for SlowReader {
    fn kind(&self) -> AgentKind {
        AgentKind::Automated
    }

    fn label(&self) -> &str {
        "slow-reader"
    }

    async fn observe(&mut self, view: &VisibleRoundState) {
        if matches!(view.phase, RoundPhase::Reveal1 | RoundPhase::Reveal2) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
    }

    async fn decide(&mut self, phase: DecisionPhase, _deadline: Instant) -> Result<Decision, AgentError> {
        Ok(Decision::primary(if phase.expects_choice() {
            DecisionValue::Choice(Choice::B)
        } else {
            DecisionValue::Bet(Bet::LOW)
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_reveal_observer_is_cut_off_at_deadline() {
    let mut seats: Vec<Seat> = (1..=4).map(|i| bot(i, HeuristicStrategy::Standard)).collect();
    seats.push(Seat::automated(Box::new(SlowReader)));
    let started = Instant::now();
    let (report, _) = run_group(short_config(2), seats).await;

    // Two reveals per round, each bounded by the 3 s phase deadline.
    assert_eq!(started.elapsed(), Duration::from_secs(12));
    assert_eq!(report.records.len(), 2);
    for record in &report.records {
        let reader = record.player(slot(5)).unwrap();
        assert_eq!(reader.origins(), [ResponseOrigin::Automated; 4]);
        assert_eq!(reader.second_choice.value, Choice::B);
    }
}

// ── Provider-backed seats ──────────────────────────────────────────

struct Unreachable;

#[async_trait]
impl DecisionProvider for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn request(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Transport("connection refused".into()))
    }
}

struct Hanging;

#[async_trait]
impl DecisionProvider for Hanging {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn request(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(ProviderResponse {
            choice: Choice::B,
            bet: Bet::HIGH,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_provider_failures_use_secondary_policy_within_deadline() {
    let margin = Duration::from_millis(500);
    let mut seats: Vec<Seat> = (1..=3).map(|i| bot(i, HeuristicStrategy::Standard)).collect();
    seats.push(Seat::automated(Box::new(ProviderAgent::new(
        "llm-down",
        Arc::new(Unreachable),
        HeuristicStrategy::Standard,
        margin,
    ))));
    seats.push(Seat::automated(Box::new(ProviderAgent::new(
        "llm-slow",
        Arc::new(Hanging),
        HeuristicStrategy::RiskTaking,
        margin,
    ))));

    let (report, _) = run_group(short_config(2), seats).await;

    for record in &report.records {
        for n in [4, 5] {
            let player = record.player(slot(n)).unwrap();
            assert_eq!(player.origins(), [ResponseOrigin::ProviderFallback; 4]);
            assert_eq!(player.first_bet.value, Bet::LOW);
        }
        // The hanging provider is cut off before the phase deadline.
        assert!(record.player(slot(5)).unwrap().first_choice.latency_ms < 3_000);
    }
    assert_eq!(report.aggregates.count(ResponseOrigin::TimeoutFallback), 0);
}
