//! Group coordinator: owns one group's slots, schedule and records and
//! sequences its rounds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};

use super::connection::ConnectionMonitor;
use super::gateway::{InputGateway, PhaseBoard};
use super::matching::{Occupant, SeatFactory, SeatPlan};
use super::slot::{Seat, Slot};
use crate::agent::{AgentKind, PolicyAgent};
use crate::config::SessionConfig;
use crate::error::{ConfigurationError, SessionError};
use crate::events::{SessionEvent, SharedEventBus};
use crate::round::{ResponseOrigin, RoundEnv, RoundRecord, RoundStateMachine};
use crate::scoring::{ScoringEngine, SessionOutcome};
use crate::sequence::{derive_group_seed, generate, Schedule};
use crate::types::{DecisionPhase, GroupId, SlotId, GROUP_SIZE};

/// Offsets into the group seed for the coordinator's own draws.
const BONUS_STREAM: u32 = 0x00b0_0001;
const STAND_IN_STREAM: u32 = 0x00b0_0100;
const INTERTRIAL_STREAM: u32 = 0x00b0_0200;

// ============================================================================
// Aggregates and report
// ============================================================================

/// Read-only statistics derived from closed round records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregates {
    /// Mean response latency per decision phase, in milliseconds.
    pub mean_latency_ms: BTreeMap<DecisionPhase, f64>,
    /// Responses per origin across all slots and phases.
    pub origin_counts: BTreeMap<ResponseOrigin, u32>,
}

impl GroupAggregates {
    pub fn from_records(records: &[RoundRecord]) -> Self {
        let mut sums: BTreeMap<DecisionPhase, (u64, u32)> = BTreeMap::new();
        let mut origin_counts = BTreeMap::new();

        for player in records.iter().flat_map(|r| &r.players) {
            let timings = [
                (DecisionPhase::FirstChoice, player.first_choice.latency_ms, player.first_choice.origin),
                (DecisionPhase::FirstBet, player.first_bet.latency_ms, player.first_bet.origin),
                (DecisionPhase::SecondChoice, player.second_choice.latency_ms, player.second_choice.origin),
                (DecisionPhase::SecondBet, player.second_bet.latency_ms, player.second_bet.origin),
            ];
            for (phase, latency, origin) in timings {
                let entry = sums.entry(phase).or_insert((0, 0));
                entry.0 += latency;
                entry.1 += 1;
                *origin_counts.entry(origin).or_insert(0) += 1;
            }
        }

        let mean_latency_ms = sums
            .into_iter()
            .map(|(phase, (total, n))| (phase, total as f64 / f64::from(n)))
            .collect();

        Self {
            mean_latency_ms,
            origin_counts,
        }
    }

    pub fn count(&self, origin: ResponseOrigin) -> u32 {
        self.origin_counts.get(&origin).copied().unwrap_or(0)
    }

    /// Responses that did not come from the seat's own primary agent.
    pub fn fallbacks(&self) -> u32 {
        self.origin_counts
            .iter()
            .filter(|(origin, _)| origin.is_fallback())
            .map(|(_, n)| n)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: GroupId,
    pub schedule: Schedule,
    pub records: Vec<RoundRecord>,
    pub outcome: SessionOutcome,
    pub aggregates: GroupAggregates,
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct GroupCoordinator {
    group: GroupId,
    config: Arc<SessionConfig>,
    schedule: Schedule,
    scoring: ScoringEngine,
    slots: Vec<Slot>,
    monitor: Arc<ConnectionMonitor>,
    board: PhaseBoard,
    gateway: Arc<InputGateway>,
    bus: SharedEventBus,
    group_seed: u64,
}

impl GroupCoordinator {
    /// Seat five agents and freeze the group's schedule.
    pub fn new(
        group: GroupId,
        group_index: u32,
        config: Arc<SessionConfig>,
        seats: Vec<Seat>,
        bus: SharedEventBus,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if seats.len() != GROUP_SIZE {
            return Err(ConfigurationError::SlotCount(seats.len()));
        }

        let schedule_config = config.schedule_config(group_index);
        let group_seed = schedule_config.seed;
        let schedule = generate(&schedule_config)?;
        let fallback = config.fallback_heuristic()?;

        let mut senders = Vec::with_capacity(GROUP_SIZE);
        let mut slots = Vec::with_capacity(GROUP_SIZE);
        for (i, seat) in seats.into_iter().enumerate() {
            let id = SlotId::from_index(i);
            let stand_in = PolicyAgent::new(
                format!("g{group}-stand-in-{id}"),
                fallback,
                derive_group_seed(group_seed, STAND_IN_STREAM + i as u32),
            );
            senders.push(seat.input);
            slots.push(Slot::new(id, seat.agent, stand_in));
        }

        let monitor = Arc::new(ConnectionMonitor::new(config.missed_phase_limit));
        let board = PhaseBoard::new();
        let gateway = Arc::new(InputGateway::new(
            config.session_id.clone(),
            group,
            board.subscribe(),
            monitor.clone(),
            senders,
        ));

        let humans = slots.iter().filter(|s| s.is_human()).count() as u8;
        info!(
            group,
            humans,
            rounds = schedule.total_rounds(),
            reversals = ?schedule.reversal_rounds(),
            "Group formed"
        );
        bus.publish(SessionEvent::GroupFormed {
            group,
            humans,
            automated: GROUP_SIZE as u8 - humans,
            total_rounds: schedule.total_rounds(),
            timestamp: Utc::now(),
        });

        Ok(Self {
            group,
            scoring: ScoringEngine::new(config.reward_unit),
            config,
            schedule,
            slots,
            monitor,
            board,
            gateway,
            bus,
            group_seed,
        })
    }

    /// Build seats from a waiting-room plan.
    pub fn form(
        group: GroupId,
        group_index: u32,
        config: Arc<SessionConfig>,
        plans: Vec<SeatPlan>,
        factory: &dyn SeatFactory,
        bus: SharedEventBus,
    ) -> Result<Self, ConfigurationError> {
        let seats = plans
            .into_iter()
            .map(|plan| match plan.occupant {
                Occupant::Human { participant } => Ok(Seat::human(participant)),
                Occupant::Automated { strategy, persona } => factory
                    .automated(group, plan.slot, strategy, persona)
                    .map(Seat::automated),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(group, group_index, config, seats, bus)
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Entry point for human inputs of this group.
    pub fn gateway(&self) -> Arc<InputGateway> {
        self.gateway.clone()
    }

    /// Connection state of this group's slots, for transports.
    pub fn monitor(&self) -> Arc<ConnectionMonitor> {
        self.monitor.clone()
    }

    pub fn slot_kinds(&self) -> Vec<AgentKind> {
        self.slots.iter().map(|s| s.primary.kind()).collect()
    }

    /// Play every round, then draw bonus outcomes once.
    pub async fn run(mut self) -> Result<GroupReport, SessionError> {
        let total_rounds = self.schedule.total_rounds();
        let mut bonus_rng = StdRng::seed_from_u64(derive_group_seed(self.group_seed, BONUS_STREAM));
        let mut intertrial_rng = StdRng::seed_from_u64(derive_group_seed(self.group_seed, INTERTRIAL_STREAM));
        let mut records = Vec::with_capacity(total_rounds as usize);

        info!(group = self.group, total_rounds, "Group session starting");

        for spec in self.schedule.rounds.clone() {
            let round = spec.index;
            let env = RoundEnv {
                group: self.group,
                total_rounds,
                deadline: self.config.phase_deadline(),
                reveal_hold: self.config.reveal_hold(),
                scoring: self.scoring,
                monitor: self.monitor.as_ref(),
                board: &self.board,
                bus: self.bus.as_ref(),
            };
            let record = RoundStateMachine::new(spec).run(&mut self.slots, &env).await?;

            let fallbacks = record
                .players
                .iter()
                .flat_map(|p| p.origins())
                .filter(|o| o.is_fallback())
                .count();
            if fallbacks > 0 {
                debug!(group = self.group, round, fallbacks, "Round closed with fallback responses");
            }
            records.push(record);

            if round < total_rounds {
                if let Some([min, max]) = self.config.intertrial_ms {
                    sleep(Duration::from_millis(intertrial_rng.random_range(min..=max))).await;
                }
            }
        }

        self.board.finish();
        let outcome = self
            .scoring
            .select_bonus_outcomes(self.group, &records, &mut bonus_rng);
        let aggregates = GroupAggregates::from_records(&records);

        info!(
            group = self.group,
            rounds = records.len(),
            fallbacks = aggregates.fallbacks(),
            "Group session complete"
        );
        self.bus.publish(SessionEvent::GroupCompleted {
            group: self.group,
            rounds: records.len() as u32,
            timestamp: Utc::now(),
        });

        Ok(GroupReport {
            group: self.group,
            schedule: self.schedule,
            records,
            outcome,
            aggregates,
        })
    }
}
