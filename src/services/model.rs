//! Groq Chat Completions Client
//!
//! OpenAI-compatible chat completions with bearer auth. The persona prompt goes
//! first, recent conversation (if any) as a second system message, then the
//! user turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::ServiceError;
use crate::conversation::truncate_chars;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Longest user turn forwarded to the model, in characters
pub const MAX_USER_TURN: usize = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Rendered recent conversation, sent as a second system message
    pub context: Option<String>,
    pub user_turn: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_turn: &str) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            context: None,
            user_turn: truncate_chars(user_turn, MAX_USER_TURN),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Attach conversation context; empty context is dropped
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context).filter(|c| !c.is_empty());
        self
    }
}

/// Remote language model
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Whether calls can be made at all (credentials present)
    fn is_available(&self) -> bool {
        true
    }

    /// Complete a request, returning the trimmed reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Groq API client
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &crate::config::Config) -> Result<Self, ServiceError> {
        Self::new(config.groq_api_key.clone(), config.groq_model.clone())
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: request.system_prompt.clone(),
        }];

        if let Some(ctx) = &request.context {
            messages.push(ChatMessage {
                role: "system",
                content: format!("Recent conversation:\n{}", ctx),
            });
        }

        messages.push(ChatMessage {
            role: "user",
            content: request.user_turn.clone(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionModel for GroqClient {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ServiceError::NotConfigured("GROQ_API_KEY"))?;

        let body = self.build_request(request);
        debug!(
            "Calling Groq API: model={}, turn_len={}",
            self.model,
            request.user_turn.len()
        );

        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }

        let result: ChatResponse = response.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::Malformed("no completion choices".to_string()))?;

        info!("Groq response: model={}, len={}", self.model, content.len());
        Ok(content)
    }
}
