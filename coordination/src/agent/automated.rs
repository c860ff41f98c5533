//! Heuristic agent used for bot seats, stand-ins and timeout filling.

use async_trait::async_trait;
use tokio::time::Instant;

use super::strategy::{HeuristicPolicy, HeuristicStrategy};
use super::view::VisibleRoundState;
use super::{AgentKind, Decision, DecisionAgent, DecisionValue};
use crate::error::AgentError;
use crate::types::{Bet, Choice, DecisionPhase, Stage};

pub struct PolicyAgent {
    label: String,
    policy: HeuristicPolicy,
    view: Option<VisibleRoundState>,
}

impl PolicyAgent {
    pub fn new(label: impl Into<String>, strategy: HeuristicStrategy, seed: u64) -> Self {
        Self {
            label: label.into(),
            policy: HeuristicPolicy::new(strategy, seed),
            view: None,
        }
    }

    pub fn strategy(&self) -> HeuristicStrategy {
        self.policy.strategy()
    }

    /// Answer immediately from `view`, without waiting for `observe`.
    pub fn decide_with(&mut self, view: &VisibleRoundState, phase: DecisionPhase) -> DecisionValue {
        self.policy.decide(phase, Some(view))
    }

    pub fn choice_for(&mut self, view: &VisibleRoundState, stage: Stage) -> Choice {
        self.policy.choose(stage, Some(view))
    }

    pub fn bet_for(&mut self, view: &VisibleRoundState, stage: Stage) -> Bet {
        self.policy.bet(stage, Some(view))
    }
}

#[async_trait]
impl DecisionAgent for PolicyAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Automated
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn observe(&mut self, view: &VisibleRoundState) {
        self.view = Some(view.clone());
    }

    async fn decide(&mut self, phase: DecisionPhase, _deadline: Instant) -> Result<Decision, AgentError> {
        Ok(Decision::primary(self.policy.decide(phase, self.view.as_ref())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::view::tests::{past, view};
    use std::time::Duration;

    #[tokio::test]
    async fn test_policy_agent_answers_every_phase() {
        let mut agent = PolicyAgent::new("bot-1", HeuristicStrategy::Standard, 1);
        let v = view(vec![past(1, Choice::B, true)], &[]);
        agent.observe(&v).await;
        let deadline = Instant::now() + Duration::from_secs(3);
        for phase in DecisionPhase::ALL {
            let decision = agent.decide(phase, deadline).await.unwrap();
            assert_eq!(decision.value.as_choice().is_some(), phase.expects_choice());
        }
        assert_eq!(agent.kind(), AgentKind::Automated);
        assert_eq!(agent.label(), "bot-1");
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let v = view(vec![], &[]);
        let mut a = PolicyAgent::new("a", HeuristicStrategy::Random, 99);
        let mut b = PolicyAgent::new("b", HeuristicStrategy::Random, 99);
        for _ in 0..20 {
            assert_eq!(
                a.decide_with(&v, DecisionPhase::FirstBet),
                b.decide_with(&v, DecisionPhase::FirstBet)
            );
        }
    }
}
