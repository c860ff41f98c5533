//! Seat factory wiring language-model seats to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::group::HeuristicSeats;
use coordination::{
    ConfigurationError, DecisionAgent, DecisionProvider, GroupId, HeuristicStrategy, ProviderAgent,
    SeatFactory, SlotId, StrategyKind,
};
use tracing::info;

use crate::config::AppConfig;
use crate::llm::ChatCompletionProvider;

pub struct AgentFactory {
    heuristics: HeuristicSeats,
    provider: Option<Arc<dyn DecisionProvider>>,
    margin: Duration,
}

impl AgentFactory {
    pub fn new(seed: u64, provider: Option<Arc<dyn DecisionProvider>>, margin: Duration) -> Self {
        Self {
            heuristics: HeuristicSeats { seed },
            provider,
            margin,
        }
    }

    /// Build the provider only when some seat needs it.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider: Option<Arc<dyn DecisionProvider>> = if config.session.needs_provider() {
            let provider = ChatCompletionProvider::new(config.provider.clone())
                .context("Failed to build provider client")?
                .with_reward_unit(config.session.reward_unit);
            info!(url = %config.provider.url, model = %config.provider.model, "Language-model seats enabled");
            Some(Arc::new(provider))
        } else {
            None
        };
        Ok(Self::new(config.session.seed, provider, config.session.provider_margin()))
    }
}

impl SeatFactory for AgentFactory {
    fn automated(
        &self,
        group: GroupId,
        slot: SlotId,
        strategy: StrategyKind,
        persona: HeuristicStrategy,
    ) -> Result<Box<dyn DecisionAgent>, ConfigurationError> {
        if strategy != StrategyKind::LanguageModel {
            return self.heuristics.automated(group, slot, strategy, persona);
        }
        let provider = self.provider.clone().ok_or_else(|| {
            ConfigurationError::Invalid(format!("slot {slot}: no provider configured for {strategy}"))
        })?;
        Ok(Box::new(ProviderAgent::new(
            format!("g{group}-llm-{slot}"),
            provider,
            persona,
            self.margin,
        )))
    }
}
