//! Round state machine: drives one round of one group through its phases.
//!
//! Each decision phase is a barrier over the five slots. Every slot's agent
//! is asked concurrently and bounded by the phase deadline; the barrier
//! closes when all five answered or the deadline passed, whichever is first.
//! Slots that did not answer in time get a value from their stand-in policy.
//!
//! Control of a slot (participant or substitute) is fixed at the phase
//! boundary from the connection monitor and never changes mid-phase.
//!
//! Views are built from state the reveals have already released, so no slot
//! sees a peer's value for a phase before that phase's barrier has closed.

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::phase::{IllegalTransition, PhaseMachine, RoundPhase};
use super::record::{Agreement, PlayerRoundRecord, Response, ResponseOrigin, RoundRecord};
use super::reveal::{peer_choices, peer_outcomes, FirstReveal, RevealBroadcast, SecondReveal, SlotView};
use crate::agent::{
    AgentKind, DecisionAgent, DecisionSource, DecisionValue, PastRound, PolicyAgent, VisibleRoundState,
};
use crate::events::{EventBus, SessionEvent};
use crate::group::connection::ConnectionMonitor;
use crate::group::gateway::PhaseBoard;
use crate::group::slot::Slot;
use crate::scoring::ScoringEngine;
use crate::sequence::RoundSpec;
use crate::types::{Bet, Choice, DecisionPhase, GroupId, Stage, GROUP_SIZE};

/// Group-level collaborators a round runs against.
pub struct RoundEnv<'a> {
    pub group: GroupId,
    pub total_rounds: u32,
    pub deadline: Duration,
    pub reveal_hold: Duration,
    pub scoring: ScoringEngine,
    pub monitor: &'a ConnectionMonitor,
    pub board: &'a PhaseBoard,
    pub bus: &'a EventBus,
}

/// A value a decision phase collects.
trait PhaseValue: Copy {
    fn extract(value: DecisionValue) -> Option<Self>;
    fn fallback(stand_in: &mut PolicyAgent, view: &VisibleRoundState, stage: Stage) -> Self;
}

impl PhaseValue for Choice {
    fn extract(value: DecisionValue) -> Option<Self> {
        value.as_choice()
    }

    fn fallback(stand_in: &mut PolicyAgent, view: &VisibleRoundState, stage: Stage) -> Self {
        stand_in.choice_for(view, stage)
    }
}

impl PhaseValue for Bet {
    fn extract(value: DecisionValue) -> Option<Self> {
        value.as_bet()
    }

    fn fallback(stand_in: &mut PolicyAgent, view: &VisibleRoundState, stage: Stage) -> Self {
        stand_in.bet_for(view, stage)
    }
}

pub struct RoundStateMachine {
    spec: RoundSpec,
    phases: PhaseMachine,
    first_choices: Vec<Response<Choice>>,
    first_bets: Vec<Response<Bet>>,
    second_choices: Vec<Response<Choice>>,
    second_bets: Vec<Response<Bet>>,
    first_revealed: bool,
}

impl RoundStateMachine {
    pub fn new(spec: RoundSpec) -> Self {
        let phases = PhaseMachine::new(spec.index);
        Self {
            spec,
            phases,
            first_choices: Vec::new(),
            first_bets: Vec::new(),
            second_choices: Vec::new(),
            second_bets: Vec::new(),
            first_revealed: false,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phases.current()
    }

    /// Drive the round to `Closed` and return its frozen record.
    pub async fn run(mut self, slots: &mut [Slot], env: &RoundEnv<'_>) -> Result<RoundRecord, IllegalTransition> {
        let round = self.spec.index;
        debug!(group = env.group, round, reversal = self.spec.is_reversal, "Round opened");
        env.bus.publish(SessionEvent::RoundStarted {
            group: env.group,
            round,
            timestamp: Utc::now(),
        });

        self.first_choices = self.collect(DecisionPhase::FirstChoice, slots, env).await;
        self.phases.step(Some(barrier_reason(&self.first_choices)))?;

        self.first_bets = self.collect(DecisionPhase::FirstBet, slots, env).await;
        self.phases.step(Some(barrier_reason(&self.first_bets)))?;

        self.reveal_first(slots, env).await;
        self.phases.step(None)?;

        self.second_choices = self.collect(DecisionPhase::SecondChoice, slots, env).await;
        self.phases.step(Some(barrier_reason(&self.second_choices)))?;

        self.second_bets = self.collect(DecisionPhase::SecondBet, slots, env).await;
        self.phases.step(Some(barrier_reason(&self.second_bets)))?;

        let players = self.reveal_second(slots, env).await;
        self.phases.step(None)?;

        env.bus.publish(SessionEvent::RoundClosed {
            group: env.group,
            round,
            timestamp: Utc::now(),
        });

        Ok(RoundRecord {
            round,
            rewarded: self.spec.rewarded,
            favored: self.spec.favored,
            is_reversal: self.spec.is_reversal,
            players,
            transitions: self.phases.into_transitions(),
        })
    }

    /// Hand disconnected human slots to their substitute and reconnected ones
    /// back to the participant.
    fn assign_control(&self, slots: &mut [Slot], env: &RoundEnv<'_>) -> [bool; GROUP_SIZE] {
        let mut substituted = [false; GROUP_SIZE];
        for slot in slots.iter_mut() {
            if slot.is_human() {
                let connected = env.monitor.is_connected(slot.id);
                if slot.substituted == connected {
                    slot.substituted = !connected;
                    let timestamp = Utc::now();
                    if slot.substituted {
                        info!(group = env.group, round = self.spec.index, slot = %slot.id, "Slot handed to substitute");
                        env.bus.publish(SessionEvent::SlotSubstituted {
                            group: env.group,
                            slot: slot.id,
                            round: self.spec.index,
                            timestamp,
                        });
                    } else {
                        info!(group = env.group, round = self.spec.index, slot = %slot.id, "Slot returned to participant");
                        env.bus.publish(SessionEvent::SlotRestored {
                            group: env.group,
                            slot: slot.id,
                            round: self.spec.index,
                            timestamp,
                        });
                    }
                }
            }
            substituted[slot.id.index()] = slot.substituted;
        }
        substituted
    }

    fn view_for(&self, slot: &Slot, phase: RoundPhase, total_rounds: u32) -> VisibleRoundState {
        let i = slot.id.index();
        let peer_first_choices = if self.first_revealed {
            let choices: Vec<Choice> = self.first_choices.iter().map(|r| r.value).collect();
            peer_choices(slot.id, &choices)
        } else {
            Vec::new()
        };
        VisibleRoundState {
            slot: slot.id,
            round: self.spec.index,
            total_rounds,
            phase,
            own_first_choice: self.first_choices.get(i).map(|r| r.value),
            own_first_bet: self.first_bets.get(i).map(|r| r.value),
            own_second_choice: self.second_choices.get(i).map(|r| r.value),
            peer_first_choices,
            history: slot.history.clone(),
        }
    }

    /// Run one decision barrier.
    async fn collect<T: PhaseValue>(
        &self,
        phase: DecisionPhase,
        slots: &mut [Slot],
        env: &RoundEnv<'_>,
    ) -> Vec<Response<T>> {
        let round = self.spec.index;
        let substituted = self.assign_control(slots, env);
        let views: Vec<VisibleRoundState> = slots
            .iter()
            .map(|slot| self.view_for(slot, RoundPhase::from(phase), env.total_rounds))
            .collect();

        let opened_at = Instant::now();
        let deadline = opened_at + env.deadline;
        env.board.open(round, phase, substituted);
        env.bus.publish(SessionEvent::PhaseOpened {
            group: env.group,
            round,
            phase,
            deadline_ms: env.deadline.as_millis() as u64,
            timestamp: Utc::now(),
        });

        let pending = slots.iter_mut().zip(&views).map(|(slot, view)| async move {
            let agent = slot.controller();
            let outcome = timeout_at(deadline, async {
                agent.observe(view).await;
                agent.decide(phase, deadline).await
            })
            .await;
            (outcome, Utc::now(), Instant::now())
        });
        let outcomes = join_all(pending).await;
        env.board.close(round);

        let mut responses = Vec::with_capacity(GROUP_SIZE);
        for ((slot, view), (outcome, at, finished)) in slots.iter_mut().zip(&views).zip(outcomes) {
            let answered = match outcome {
                Ok(Ok(decision)) => match T::extract(decision.value) {
                    Some(value) => Some((value, primary_origin(slot, decision.source))),
                    None => {
                        warn!(group = env.group, round, slot = %slot.id, phase = %phase, "Agent answered with the wrong value kind");
                        None
                    }
                },
                Ok(Err(e)) => {
                    debug!(group = env.group, round, slot = %slot.id, phase = %phase, error = %e, "Agent could not decide");
                    None
                }
                Err(_) => {
                    // Input the gateway accepted before the board closed still counts.
                    let queued = slot.controller().take_queued(phase).and_then(|decision| {
                        T::extract(decision.value).map(|value| (value, primary_origin(slot, decision.source)))
                    });
                    if queued.is_none() {
                        debug!(group = env.group, round, slot = %slot.id, phase = %phase, "Deadline elapsed");
                    }
                    queued
                }
            };

            let (value, origin) = match answered {
                Some(answer) => answer,
                None => {
                    let origin = if slot.substituted {
                        ResponseOrigin::AgentSubstituted
                    } else {
                        ResponseOrigin::TimeoutFallback
                    };
                    (T::fallback(&mut slot.stand_in, view, phase.stage()), origin)
                }
            };

            if slot.is_human() && !slot.substituted {
                if origin == ResponseOrigin::TimeoutFallback {
                    if env.monitor.record_missed(slot.id) {
                        warn!(group = env.group, round, slot = %slot.id, "Slot missed too many deadlines");
                    }
                } else {
                    env.monitor.record_response(slot.id);
                }
            }

            responses.push(Response {
                value,
                at,
                latency_ms: finished.saturating_duration_since(opened_at).as_millis() as u64,
                origin,
            });
        }

        let timed_out = responses
            .iter()
            .filter(|r| r.origin == ResponseOrigin::TimeoutFallback)
            .count() as u8;
        env.bus.publish(SessionEvent::PhaseClosed {
            group: env.group,
            round,
            phase,
            timed_out,
            timestamp: Utc::now(),
        });
        responses
    }

    /// Show every slot its peers' first choices and both its own first-stage
    /// values.
    async fn reveal_first(&mut self, slots: &mut [Slot], env: &RoundEnv<'_>) {
        self.first_revealed = true;
        let choices: Vec<Choice> = self.first_choices.iter().map(|r| r.value).collect();
        let views = slots
            .iter()
            .map(|slot| {
                let i = slot.id.index();
                SlotView::First(FirstReveal {
                    slot: slot.id,
                    own_choice: choices[i],
                    own_bet: self.first_bets[i].value,
                    peers: peer_choices(slot.id, &choices),
                })
            })
            .collect();

        env.bus.publish(SessionEvent::Reveal(RevealBroadcast {
            group: env.group,
            round: self.spec.index,
            phase: RoundPhase::Reveal1,
            views,
        }));
        self.notify(slots, RoundPhase::Reveal1, env).await;
        hold(env.reveal_hold).await;
    }

    /// Score the second stage, show each slot its own delta and its peers'
    /// choices and correctness, and freeze the per-slot records.
    async fn reveal_second(&mut self, slots: &mut [Slot], env: &RoundEnv<'_>) -> Vec<PlayerRoundRecord> {
        let round = self.spec.index;
        let rewarded = self.spec.rewarded;
        let first: Vec<Choice> = self.first_choices.iter().map(|r| r.value).collect();
        let second: Vec<Choice> = self.second_choices.iter().map(|r| r.value).collect();

        let mut views = Vec::with_capacity(GROUP_SIZE);
        let mut players = Vec::with_capacity(GROUP_SIZE);
        for slot in slots.iter_mut() {
            let i = slot.id.index();
            let (fc, fb) = (self.first_choices[i], self.first_bets[i]);
            let (sc, sb) = (self.second_choices[i], self.second_bets[i]);

            let first_correct = fc.value == rewarded;
            let second_correct = sc.value == rewarded;
            let first_delta = env.scoring.score(fc.value, fb.value, rewarded);
            let second_delta = env.scoring.score(sc.value, sb.value, rewarded);
            let peer_first = peer_choices(slot.id, &first);
            let peer_second = peer_outcomes(slot.id, &second, rewarded);

            views.push(SlotView::Second(SecondReveal {
                slot: slot.id,
                own_choice: sc.value,
                own_bet: sb.value,
                own_correct: second_correct,
                own_delta: second_delta,
                peers: peer_second.clone(),
            }));

            players.push(PlayerRoundRecord {
                slot: slot.id,
                first_choice: fc,
                first_bet: fb,
                second_choice: sc,
                second_bet: sb,
                first_correct,
                second_correct,
                first_delta,
                second_delta,
                switched: fc.value != sc.value,
                first_agreement: Agreement::count(fc.value, peer_first.iter().map(|p| p.choice)),
                second_agreement: Agreement::count(sc.value, peer_second.iter().map(|p| p.choice)),
            });

            slot.history.push(PastRound {
                round,
                first_choice: fc.value,
                first_bet: fb.value,
                second_choice: sc.value,
                second_bet: sb.value,
                correct: second_correct,
                delta: second_delta,
                peer_first,
                peer_second,
            });
        }

        env.bus.publish(SessionEvent::Reveal(RevealBroadcast {
            group: env.group,
            round,
            phase: RoundPhase::Reveal2,
            views,
        }));
        self.notify(slots, RoundPhase::Reveal2, env).await;
        hold(env.reveal_hold).await;
        players
    }

    /// Let both the primary agent and the stand-in see a reveal.
    ///
    /// Primaries observe concurrently and are cut off after one phase
    /// deadline; the stand-in always sees the view.
    async fn notify(&self, slots: &mut [Slot], phase: RoundPhase, env: &RoundEnv<'_>) {
        let views: Vec<VisibleRoundState> = slots
            .iter()
            .map(|slot| self.view_for(slot, phase, env.total_rounds))
            .collect();
        let deadline = Instant::now() + env.deadline;
        let round = self.spec.index;

        let pending = slots.iter_mut().zip(&views).map(|(slot, view)| async move {
            if timeout_at(deadline, slot.primary.observe(view)).await.is_err() {
                warn!(group = env.group, round, slot = %slot.id, phase = %phase, "Agent did not observe the reveal in time");
            }
            slot.stand_in.observe(view).await;
        });
        join_all(pending).await;
    }
}

fn primary_origin(slot: &Slot, source: DecisionSource) -> ResponseOrigin {
    if slot.substituted {
        return ResponseOrigin::AgentSubstituted;
    }
    match (slot.primary.kind(), source) {
        (AgentKind::Human, _) => ResponseOrigin::Human,
        (AgentKind::Automated, DecisionSource::Primary) => ResponseOrigin::Automated,
        (AgentKind::Automated, DecisionSource::SecondaryPolicy) => ResponseOrigin::ProviderFallback,
    }
}

fn barrier_reason<T>(responses: &[Response<T>]) -> &'static str {
    if responses
        .iter()
        .any(|r| r.origin == ResponseOrigin::TimeoutFallback)
    {
        "deadline elapsed"
    } else {
        "all responded"
    }
}

async fn hold(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}
