//! Session configuration.
//!
//! Everything a session needs is fixed here before the first group forms.
//! Fields left unset fall back to the defaults of the task mode (main task or
//! practice). `validate()` rejects any combination for which a schedule or a
//! round deadline cannot exist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentKind, HeuristicStrategy, StrategyKind};
use crate::error::ConfigurationError;
use crate::scoring::DEFAULT_REWARD_UNIT;
use crate::sequence::{derive_group_seed, ScheduleConfig};
use crate::types::{Bet, GROUP_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    #[default]
    Main,
    Practice,
}

impl TaskMode {
    pub fn default_rounds(self) -> u32 {
        match self {
            Self::Main => 64,
            Self::Practice => 5,
        }
    }

    pub fn default_deadline_ms(self) -> u64 {
        match self {
            Self::Main => 3_000,
            Self::Practice => 6_000,
        }
    }

    /// Practice runs as a single block without reversals.
    pub fn default_block_bounds(self) -> (u32, u32) {
        match self {
            Self::Main => (8, 12),
            Self::Practice => (5, 5),
        }
    }
}

/// One seat of the group roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub kind: AgentKind,
    /// Policy for automated seats, and for a human seat left empty after
    /// matching times out.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Style the language-model strategy is prompted with.
    #[serde(default)]
    pub persona: HeuristicStrategy,
}

impl SlotConfig {
    pub fn automated(strategy: StrategyKind) -> Self {
        Self {
            kind: AgentKind::Automated,
            strategy,
            persona: HeuristicStrategy::Standard,
        }
    }

    pub fn human() -> Self {
        Self {
            kind: AgentKind::Human,
            strategy: StrategyKind::Standard,
            persona: HeuristicStrategy::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_id: String,
    pub mode: TaskMode,
    pub total_rounds: Option<u32>,
    pub reward_unit: i32,
    pub min_block_len: Option<u32>,
    pub max_block_len: Option<u32>,
    pub favored_prob: f64,
    pub seed: u64,
    pub phase_deadline_ms: Option<u64>,
    /// How much earlier than the phase deadline a provider call is cut off.
    pub provider_margin_ms: u64,
    /// Consecutive missed deadlines before a human slot counts as
    /// disconnected. `None` disables the check.
    pub missed_phase_limit: Option<u32>,
    pub matching_timeout_ms: u64,
    pub reveal_hold_ms: u64,
    /// Inter-trial interval range `[min, max]` in milliseconds.
    pub intertrial_ms: Option<[u64; 2]>,
    /// Stand-in policy for timeouts and disconnections.
    pub fallback_strategy: StrategyKind,
    pub slots: Vec<SlotConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: "session".to_string(),
            mode: TaskMode::Main,
            total_rounds: None,
            reward_unit: DEFAULT_REWARD_UNIT,
            min_block_len: None,
            max_block_len: None,
            favored_prob: 0.75,
            seed: 0,
            phase_deadline_ms: None,
            provider_margin_ms: 500,
            missed_phase_limit: Some(5),
            matching_timeout_ms: 15_000,
            reveal_hold_ms: 0,
            intertrial_ms: None,
            fallback_strategy: StrategyKind::Random,
            slots: vec![SlotConfig::automated(StrategyKind::Standard); GROUP_SIZE],
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::Invalid(e.to_string()))
    }

    pub fn rounds(&self) -> u32 {
        self.total_rounds.unwrap_or_else(|| self.mode.default_rounds())
    }

    pub fn block_bounds(&self) -> (u32, u32) {
        let (min, max) = self.mode.default_block_bounds();
        (self.min_block_len.unwrap_or(min), self.max_block_len.unwrap_or(max))
    }

    pub fn phase_deadline(&self) -> Duration {
        Duration::from_millis(
            self.phase_deadline_ms
                .unwrap_or_else(|| self.mode.default_deadline_ms()),
        )
    }

    pub fn provider_margin(&self) -> Duration {
        Duration::from_millis(self.provider_margin_ms)
    }

    pub fn reveal_hold(&self) -> Duration {
        Duration::from_millis(self.reveal_hold_ms)
    }

    pub fn matching_timeout(&self) -> Duration {
        Duration::from_millis(self.matching_timeout_ms)
    }

    pub fn fallback_heuristic(&self) -> Result<HeuristicStrategy, ConfigurationError> {
        self.fallback_strategy
            .heuristic()
            .ok_or_else(|| ConfigurationError::FallbackNotHeuristic(self.fallback_strategy.to_string()))
    }

    /// Schedule parameters for the group at `group_index`.
    pub fn schedule_config(&self, group_index: u32) -> ScheduleConfig {
        let (min, max) = self.block_bounds();
        ScheduleConfig {
            total_rounds: self.rounds(),
            min_block_len: min,
            max_block_len: max,
            favored_prob: self.favored_prob,
            seed: derive_group_seed(self.seed, group_index),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.schedule_config(0).validate()?;

        if self.reward_unit <= 0 {
            return Err(ConfigurationError::InvalidRewardUnit);
        }
        // Both stages at maximum bet every round must still fit a point total.
        let rounds = self.rounds();
        let worst_case = i32::try_from(rounds)
            .ok()
            .and_then(|n| n.checked_mul(2 * i32::from(Bet::HIGH.get())))
            .and_then(|n| n.checked_mul(self.reward_unit));
        if worst_case.is_none() {
            return Err(ConfigurationError::RewardUnitTooLarge {
                unit: self.reward_unit,
                rounds,
            });
        }

        let deadline_ms = self.phase_deadline().as_millis() as u64;
        if deadline_ms == 0 {
            return Err(ConfigurationError::InvalidDeadline);
        }
        if self.provider_margin_ms >= deadline_ms {
            return Err(ConfigurationError::ProviderMarginTooLarge {
                margin_ms: self.provider_margin_ms,
                deadline_ms,
            });
        }

        if self.slots.len() != GROUP_SIZE {
            return Err(ConfigurationError::SlotCount(self.slots.len()));
        }
        self.fallback_heuristic()?;

        if let Some([min, max]) = self.intertrial_ms {
            if min > max {
                return Err(ConfigurationError::Invalid(format!(
                    "inter-trial interval [{min}, {max}] is empty"
                )));
            }
        }
        if self.missed_phase_limit == Some(0) {
            return Err(ConfigurationError::Invalid(
                "missed_phase_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether any seat is backed by a language-model provider.
    pub fn needs_provider(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.strategy == StrategyKind::LanguageModel)
    }
}
