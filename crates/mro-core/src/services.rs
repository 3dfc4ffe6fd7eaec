//! Builds the service clients selected in [`Config`], checking that every
//! secret they need is present before anything is called.

use tracing::debug;

use crate::chat::{ChatModel, GroqChat};
use crate::config::{ChatProvider, Config, ConfigError, EmbeddingProvider, Secret, Secrets, StoreProvider};
use crate::embedding::{CohereEmbedder, Embedder};
use crate::index::IngestOptions;
use crate::ollama::{OllamaClient, OllamaError};
use crate::pinecone::PineconeIndex;
use crate::session::Chatbot;
use crate::store::{MemoryStore, VectorStore};
use crate::voice::{GroqTranscriber, Transcriber};

pub fn embedder(config: &Config, secrets: &Secrets) -> Result<Box<dyn Embedder>, ConfigError> {
    let model = config.embedding.model();
    debug!(provider = ?config.embedding.provider, model, "embedding model");
    Ok(match config.embedding.provider {
        EmbeddingProvider::Cohere => {
            let key = secrets.require(Secret::CohereApiKey)?;
            Box::new(CohereEmbedder::new(key, model)?)
        }
        EmbeddingProvider::Ollama => Box::new(ollama(config)?.with_embed_model(model)),
    })
}

pub fn vector_store(config: &Config, secrets: &Secrets) -> Result<Box<dyn VectorStore>, ConfigError> {
    Ok(match config.vector_store {
        StoreProvider::Pinecone => {
            let key = secrets.require(Secret::PineconeApiKey)?;
            let host = secrets.require(Secret::PineconeHost)?;
            Box::new(PineconeIndex::new(key, host, &config.index_name)?)
        }
        StoreProvider::Memory => Box::new(MemoryStore::new()),
    })
}

pub fn chat_model(config: &Config, secrets: &Secrets) -> Result<Box<dyn ChatModel>, ConfigError> {
    let model = config.chat.model();
    debug!(provider = ?config.chat.provider, model, "chat model");
    Ok(match config.chat.provider {
        ChatProvider::Groq => {
            let key = secrets.require(Secret::GroqApiKey)?;
            Box::new(GroqChat::new(key, model)?.with_sampling(config.chat.temperature, config.chat.max_tokens))
        }
        ChatProvider::Ollama => Box::new(ollama(config)?.with_chat_model(model)),
    })
}

/// Transcription always goes to Groq.
pub fn transcriber(config: &Config, secrets: &Secrets) -> Result<Box<dyn Transcriber>, ConfigError> {
    let key = secrets.require(Secret::GroqApiKey)?;
    Ok(Box::new(GroqTranscriber::new(key, &config.transcription_model)?))
}

/// Embedder, store and chat model wired into one [`Chatbot`].
pub fn chatbot(config: &Config, secrets: &Secrets) -> Result<Chatbot, ConfigError> {
    config.validate()?;
    Ok(Chatbot::new(
        embedder(config, secrets)?,
        vector_store(config, secrets)?,
        chat_model(config, secrets)?,
        &config.namespace,
        config.top_k,
    ))
}

pub fn ingest_options(config: &Config) -> Result<IngestOptions, ConfigError> {
    Ok(IngestOptions {
        chunking: config.chunk_options()?,
        id_strategy: config.id_strategy,
        images_dir: Some(config.images_dir()),
        ..IngestOptions::new(&config.namespace)
    })
}

fn ollama(config: &Config) -> Result<OllamaClient, ConfigError> {
    OllamaClient::from_url(&config.ollama_url).map_err(|e| match e {
        OllamaError::ParseUrl(e) => ConfigError::InvalidUrl(format!("ollama_url: {e}")),
        other => ConfigError::Invalid(other.to_string()),
    })
}
