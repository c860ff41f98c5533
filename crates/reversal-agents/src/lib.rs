//! Runtime shell for the reversal-learning group task.
//!
//! The engine itself lives in `coordination`. This crate adds what a real
//! run needs around it: TOML/env configuration, the chat-completions
//! provider behind language-model seats, the seat factory, tracing setup and
//! artifact writing.

pub mod config;
pub mod factory;
pub mod llm;
pub mod prompts;
pub mod telemetry;

pub use config::{AppConfig, ProviderConfig};
pub use factory::AgentFactory;
pub use llm::ChatCompletionProvider;
