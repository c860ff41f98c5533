//! Chat-completions decision provider.
//!
//! Posts the seat's prompt to an OpenAI-compatible `/chat/completions`
//! endpoint and parses the first JSON object of the reply.

use async_trait::async_trait;
use coordination::agent::parse_provider_reply;
use coordination::scoring::DEFAULT_REWARD_UNIT;
use coordination::{DecisionProvider, ProviderError, ProviderRequest, ProviderResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::prompts::{system_prompt, user_prompt};

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice.
    pub fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ProviderError::Empty)
    }
}

pub struct ChatCompletionProvider {
    http: reqwest::Client,
    config: ProviderConfig,
    reward_unit: i32,
}

impl ChatCompletionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            reward_unit: DEFAULT_REWARD_UNIT,
        })
    }

    /// Points per bet unit quoted in the task rules.
    pub fn with_reward_unit(mut self, reward_unit: i32) -> Self {
        self.reward_unit = reward_unit;
        self
    }

    pub fn chat_request(&self, request: &ProviderRequest) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(request.strategy, self.reward_unit),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(request),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl DecisionProvider for ChatCompletionProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn request(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = self.chat_request(&request);

        let mut call = self.http.post(self.config.chat_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }
        let response = call
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let text = chat.into_text()?;
        debug!(model = %self.config.model, round = request.round, stage = %request.stage, reply = %text, "Provider reply");
        parse_provider_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::{HeuristicStrategy, Stage};

    fn request() -> ProviderRequest {
        ProviderRequest {
            round: 3,
            total_rounds: 64,
            stage: Stage::First,
            round_history: Vec::new(),
            visible_peer_choices: Vec::new(),
            own_first_choice: None,
            own_first_bet: None,
            strategy: HeuristicStrategy::SocialFollower,
            deadline_millis: 2_500,
        }
    }

    #[test]
    fn test_chat_request_shape() {
        let provider = ChatCompletionProvider::new(ProviderConfig {
            model: "tiny".into(),
            ..ProviderConfig::default()
        })
        .unwrap();
        let body = serde_json::to_value(provider.chat_request(&request())).unwrap();
        assert_eq!(body["model"], "tiny");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Round 3 of 64"));
    }

    #[test]
    fn test_system_message_quotes_reward_unit() {
        let provider = ChatCompletionProvider::new(ProviderConfig::default())
            .unwrap()
            .with_reward_unit(35);
        let body = serde_json::to_value(provider.chat_request(&request())).unwrap();
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("wins 35 points per bet unit"));
    }

    #[test]
    fn test_empty_reply_is_an_error() {
        let chat: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(chat.into_text(), Err(ProviderError::Empty)));

        let chat: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap();
        assert!(matches!(chat.into_text(), Err(ProviderError::Empty)));
    }
}
