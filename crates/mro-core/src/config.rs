//! Persisted config (document folder, index, models) in the app data directory,
//! plus API secrets read from the environment.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{ChunkError, ChunkOptions, IdStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_INDEX_NAME: &str = "mro";
pub const DEFAULT_NAMESPACE: &str = "ns1";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MEMORY_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder with the manuals to ingest (PDF and plain text).
    pub documents_dir: String,
    /// Folder with figure images referenced by the manuals.
    pub images_dir: String,
    pub index_name: String,
    pub namespace: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Number of past exchanges sent along with each question.
    pub memory_window: usize,
    pub id_strategy: IdStrategy,
    pub vector_store: StoreProvider,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub ollama_url: String,
    pub transcription_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: "data".to_string(),
            images_dir: "images".to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            memory_window: DEFAULT_MEMORY_WINDOW,
            id_strategy: IdStrategy::default(),
            vector_store: StoreProvider::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            ollama_url: crate::ollama::DEFAULT_BASE_URL.to_string(),
            transcription_model: crate::voice::DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Chunk window settings, validated.
    pub fn chunk_options(&self) -> Result<ChunkOptions, ConfigError> {
        Ok(ChunkOptions::new(self.chunk_size, self.chunk_overlap)?)
    }

    pub fn documents_dir(&self) -> PathBuf {
        PathBuf::from(&self.documents_dir)
    }

    pub fn images_dir(&self) -> PathBuf {
        PathBuf::from(&self.images_dir)
    }

    /// Pretty TOML, as written to `config.toml`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks the values that would otherwise only fail deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunk_options()?;
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".to_string()));
        }
        url::Url::parse(&self.ollama_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("ollama_url: {e}")))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Hosted Pinecone index.
    #[default]
    Pinecone,
    /// In-process store, rebuilt from the documents folder on every run.
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Cohere,
    Ollama,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    #[default]
    Groq,
    Ollama,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Model name; the provider default when unset.
    pub model: Option<String>,
}

impl EmbeddingConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            EmbeddingProvider::Cohere => crate::embedding::DEFAULT_COHERE_MODEL,
            EmbeddingProvider::Ollama => crate::ollama::DEFAULT_EMBED_MODEL,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: ChatProvider,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProvider::default(),
            model: None,
            temperature: crate::chat::DEFAULT_TEMPERATURE,
            max_tokens: crate::chat::DEFAULT_MAX_TOKENS,
        }
    }
}

impl ChatConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            ChatProvider::Groq => crate::chat::DEFAULT_GROQ_MODEL,
            ChatProvider::Ollama => crate::ollama::DEFAULT_CHAT_MODEL,
        })
    }
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    load_config_from(&data_dir.join(CONFIG_FILENAME))
}

/// Load config from an explicit file. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            Config::default()
        }
    }
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &data_dir.join(CONFIG_FILENAME))
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, config.to_toml()?).map_err(ConfigError::Write)
}

/// Path of the config file, if the app data directory can be determined.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Set and persist the documents folder.
pub fn set_documents_dir(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.documents_dir = path.to_string_lossy().into_owned();
    save_config(&config)
}

/// API credentials. Read from the process environment (and `.env`, see
/// [`load_dotenv`]); never persisted.
#[derive(Clone, Default)]
pub struct Secrets {
    cohere_api_key: Option<String>,
    pinecone_api_key: Option<String>,
    pinecone_host: Option<String>,
    groq_api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    CohereApiKey,
    PineconeApiKey,
    PineconeHost,
    GroqApiKey,
}

impl Secret {
    pub fn env_var(self) -> &'static str {
        match self {
            Secret::CohereApiKey => "COHERE_API_KEY",
            Secret::PineconeApiKey => "PINECONE_API_KEY",
            Secret::PineconeHost => "PINECONE_HOST",
            Secret::GroqApiKey => "GROQ_API_KEY",
        }
    }

    pub const ALL: [Secret; 4] = [
        Secret::CohereApiKey,
        Secret::PineconeApiKey,
        Secret::PineconeHost,
        Secret::GroqApiKey,
    ];
}

/// Loads a `.env` file from the working directory (or a parent) into the
/// environment. Missing file is fine.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds secrets from any name → value lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |s: Secret| lookup(s.env_var()).filter(|v| !v.trim().is_empty());
        Self {
            cohere_api_key: get(Secret::CohereApiKey),
            pinecone_api_key: get(Secret::PineconeApiKey),
            pinecone_host: get(Secret::PineconeHost),
            groq_api_key: get(Secret::GroqApiKey),
        }
    }

    pub fn get(&self, secret: Secret) -> Option<&str> {
        match secret {
            Secret::CohereApiKey => self.cohere_api_key.as_deref(),
            Secret::PineconeApiKey => self.pinecone_api_key.as_deref(),
            Secret::PineconeHost => self.pinecone_host.as_deref(),
            Secret::GroqApiKey => self.groq_api_key.as_deref(),
        }
    }

    /// Returns the secret or a config error naming the missing variable.
    pub fn require(&self, secret: Secret) -> Result<&str, ConfigError> {
        self.get(secret)
            .ok_or(ConfigError::MissingSecret(secret.env_var()))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Secrets");
        for s in Secret::ALL {
            d.field(s.env_var(), &self.get(s).map(|_| "<redacted>"));
        }
        d.finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("missing secret: set the {0} environment variable")]
    MissingSecret(&'static str),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid chunking settings: {0}")]
    Chunking(#[from] ChunkError),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}
