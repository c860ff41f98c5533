//! Language-model-backed agent behind a narrow provider contract.
//!
//! The provider is asked once per stage, in the choice phase, for both the
//! choice and the bet. The call runs under an inner deadline that ends
//! `margin` before the phase deadline. A late, failing or unparsable reply
//! switches the agent to its secondary policy for the rest of that stage:
//! repeat the last own choice (option A before any history) with bet 1.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::strategy::HeuristicStrategy;
use super::view::{PastRound, VisibleRoundState};
use super::{AgentKind, Decision, DecisionAgent, DecisionValue};
use crate::error::{AgentError, ProviderError};
use crate::round::reveal::PeerChoice;
use crate::types::{Bet, Choice, DecisionPhase, Stage};

/// Outbound request to a text-generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub round: u32,
    pub total_rounds: u32,
    pub stage: Stage,
    pub round_history: Vec<PastRound>,
    pub visible_peer_choices: Vec<PeerChoice>,
    pub own_first_choice: Option<Choice>,
    pub own_first_bet: Option<Bet>,
    pub strategy: HeuristicStrategy,
    /// Time left for the provider to answer.
    pub deadline_millis: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub choice: Choice,
    pub bet: Bet,
}

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn request(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

#[derive(Deserialize)]
struct RawReply {
    choice: String,
    bet: serde_json::Value,
}

/// Parse the first `{...}` object in `text` as `{"choice": "A"|"B", "bet": 1..=3}`.
pub fn parse_provider_reply(text: &str) -> Result<ProviderResponse, ProviderError> {
    let object = first_json_object(text)
        .ok_or_else(|| ProviderError::Malformed("no JSON object in reply".to_string()))?;
    let raw: RawReply =
        serde_json::from_str(object).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let choice = raw
        .choice
        .parse::<Choice>()
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let bet = raw
        .bet
        .as_i64()
        .ok_or_else(|| ProviderError::Malformed(format!("bet is not an integer: {}", raw.bet)))
        .and_then(|b| Bet::try_from(b).map_err(|e| ProviderError::Malformed(e.to_string())))?;

    Ok(ProviderResponse { choice, bet })
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub struct ProviderAgent {
    label: String,
    provider: Arc<dyn DecisionProvider>,
    persona: HeuristicStrategy,
    margin: Duration,
    view: Option<VisibleRoundState>,
    /// Bet returned alongside this stage's choice.
    pending_bet: Option<Bet>,
    last_choice: Option<Choice>,
}

impl ProviderAgent {
    pub fn new(
        label: impl Into<String>,
        provider: Arc<dyn DecisionProvider>,
        persona: HeuristicStrategy,
        margin: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            provider,
            persona,
            margin,
            view: None,
            pending_bet: None,
            last_choice: None,
        }
    }

    fn request_for(&self, stage: Stage, budget: Duration) -> ProviderRequest {
        match &self.view {
            Some(view) => ProviderRequest {
                round: view.round,
                total_rounds: view.total_rounds,
                stage,
                round_history: view.history.clone(),
                visible_peer_choices: view.peer_first_choices.clone(),
                own_first_choice: view.own_first_choice,
                own_first_bet: view.own_first_bet,
                strategy: self.persona,
                deadline_millis: budget.as_millis() as u64,
            },
            None => ProviderRequest {
                round: 0,
                total_rounds: 0,
                stage,
                round_history: Vec::new(),
                visible_peer_choices: Vec::new(),
                own_first_choice: None,
                own_first_bet: None,
                strategy: self.persona,
                deadline_millis: budget.as_millis() as u64,
            },
        }
    }

    /// Repeat the most recent own choice; option A before any history.
    fn secondary_choice(&self, stage: Stage) -> Choice {
        let from_view = self.view.as_ref().and_then(|view| match stage {
            Stage::Second => view
                .own_first_choice
                .or_else(|| view.last_round().map(|r| r.second_choice)),
            Stage::First => view.last_round().map(|r| r.second_choice),
        });
        from_view.or(self.last_choice).unwrap_or(Choice::A)
    }

    async fn decide_choice(&mut self, stage: Stage, deadline: Instant) -> Decision {
        let now = Instant::now();
        let inner = deadline
            .checked_sub(self.margin)
            .filter(|inner| *inner > now)
            .unwrap_or(now);
        let request = self.request_for(stage, inner.saturating_duration_since(now));

        let reply = match timeout_at(inner, self.provider.request(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(ProviderError::Timeout(
                inner.saturating_duration_since(now).as_millis() as u64,
            )),
        };

        match reply {
            Ok(response) => {
                debug!(agent = %self.label, choice = %response.choice, bet = %response.bet, "Provider answered");
                self.pending_bet = Some(response.bet);
                self.last_choice = Some(response.choice);
                Decision::primary(DecisionValue::Choice(response.choice))
            }
            Err(e) => {
                warn!(agent = %self.label, provider = self.provider.name(), error = %e, "Provider failed, using secondary policy");
                self.pending_bet = None;
                let choice = self.secondary_choice(stage);
                self.last_choice = Some(choice);
                Decision::secondary(DecisionValue::Choice(choice))
            }
        }
    }
}

#[async_trait]
impl DecisionAgent for ProviderAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Automated
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn observe(&mut self, view: &VisibleRoundState) {
        self.view = Some(view.clone());
    }

    async fn decide(&mut self, phase: DecisionPhase, deadline: Instant) -> Result<Decision, AgentError> {
        if phase.expects_choice() {
            return Ok(self.decide_choice(phase.stage(), deadline).await);
        }
        Ok(match self.pending_bet.take() {
            Some(bet) => Decision::primary(DecisionValue::Bet(bet)),
            None => Decision::secondary(DecisionValue::Bet(Bet::LOW)),
        })
    }
}
