//! Ollama client for embeddings and chat completion. Wraps ollama-rs so a local
//! model server can stand in for the hosted services.

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage as OllamaMessage, MessageRole};
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;
use tracing::debug;

use crate::chat::{ChatMessage, ChatModel, Role};
use crate::embedding::{Embedder, InputKind};
use crate::error::ServiceError;

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "llama3";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
}

impl OllamaClient {
    /// Create from URL string. Default: http://localhost:11434.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model used when the session doesn't pick one.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    /// Ollama embeds documents and queries the same way; `kind` is ignored.
    async fn embed(&self, text: &str, _kind: InputKind) -> Result<Vec<f32>, ServiceError> {
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        res.embeddings
            .into_iter()
            .next()
            .ok_or(ServiceError::Empty {
                service: "ollama",
                what: "embedding",
            })
    }

    fn model(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        let messages = messages.iter().map(to_ollama).collect();
        let res = self
            .inner
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await
            .map_err(OllamaError::Request)?;
        debug!(model, chars = res.message.content.len(), "ollama completion");
        Ok(res.message.content)
    }

    fn default_model(&self) -> &str {
        &self.chat_model
    }
}

fn to_ollama(message: &ChatMessage) -> OllamaMessage {
    let role = match message.role {
        Role::System => MessageRole::System,
        Role::User => MessageRole::User,
        Role::Assistant => MessageRole::Assistant,
    };
    OllamaMessage::new(role, message.content.clone())
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}

impl From<OllamaError> for ServiceError {
    fn from(e: OllamaError) -> Self {
        match e {
            OllamaError::Request(e) => ServiceError::Ollama(e),
            OllamaError::ParseUrl(e) => ServiceError::Decode {
                service: "ollama",
                message: e.to_string(),
            },
        }
    }
}
