//! Chat completion against a hosted LLM.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::error::ServiceError;
use crate::http;

pub const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

const SERVICE: &str = "groq";
const CHAT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One blocking completion: the whole prompt in, the answer text out.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ServiceError>;

    /// Model used when the session hasn't picked one.
    fn default_model(&self) -> &str;
}

/// Groq's OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct GroqChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
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

impl GroqChat {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::client(CHAT_TIMEOUT)?,
            api_key: api_key.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: GROQ_BASE_URL.to_string(),
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Point at another OpenAI-compatible host (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ChatModel for GroqChat {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        let body = CompletionRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body);
        let res: CompletionResponse = http::send_json(SERVICE, request).await?;
        let text = res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ServiceError::Empty {
                service: SERVICE,
                what: "choice",
            })?;
        debug!(model, chars = text.len(), "groq completion");
        Ok(text)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
