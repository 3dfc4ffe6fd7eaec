//! All backend logic independent of how the app is run.
//!
//! Maintenance manuals live in a folder the user chooses. They are split into
//! chunks, embedded and written to a vector index; questions are answered from
//! the closest chunks by a hosted LLM. MRO stores only its config in its own
//! app data directory (see [app_data]).

pub mod app_data;
pub mod chat;
pub mod chunks;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod figures;
mod http;
pub mod index;
pub mod memory;
pub mod ollama;
pub mod pinecone;
pub mod prompt;
pub mod retrieval;
pub mod services;
pub mod session;
pub mod store;
pub mod voice;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use app_data::app_data_dir;
pub use chat::{ChatMessage, ChatModel, GroqChat, Role};
pub use chunks::{chunk_document, chunk_documents, split_text, Chunk, ChunkOptions, IdStrategy};
pub use config::{load_config, load_dotenv, save_config, set_documents_dir, Config, ConfigError, Secret, Secrets};
pub use documents::{scan_documents, SourceDocument, ScanError};
pub use embedding::{CohereEmbedder, Embedder, InputKind};
pub use error::{Error, ErrorClass, Recovery, ServiceError};
pub use figures::FigureCatalog;
pub use index::{ingest, setup_index, verify_index, watch_and_ingest, IndexError, IngestOptions, IngestReport};
pub use memory::ConversationMemory;
pub use ollama::OllamaClient;
pub use pinecone::PineconeIndex;
pub use retrieval::retrieve;
pub use session::{Answer, ChatSession, Chatbot, Exchange, FigureHit, SourceRef};
pub use store::{IndexStats, Match, MemoryStore, VectorRecord, VectorStore};
pub use voice::{capture, GroqTranscriber, PcmSource, Transcriber, VoiceError};
pub use watcher::{watch_documents, DocumentWatcher, WatchError};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "mro-core ready"
}
