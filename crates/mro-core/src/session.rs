//! Chat session state and the question → answer flow.
//!
//! [`Chatbot`] owns the service handles and is shared for the life of the
//! process. [`ChatSession`] is the per-conversation state: created on the first
//! question, reset by [`ChatSession::clear`], passed explicitly to
//! [`Chatbot::ask`].

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chat::ChatModel;
use crate::embedding::Embedder;
use crate::error::Error;
use crate::memory::ConversationMemory;
use crate::prompt::{build_messages, format_context};
use crate::retrieval::retrieve;
use crate::store::{Match, VectorStore};

/// One displayed question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub query: String,
    pub response: String,
    pub figure: Option<FigureHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureHit {
    pub citation: String,
    /// Image to show next to the answer; `None` when it was never resolved or
    /// has since disappeared.
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: Option<u32>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub figure: Option<FigureHit>,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    history: Vec<Exchange>,
    memory: ConversationMemory,
    model: String,
}

impl ChatSession {
    pub fn new(model: impl Into<String>, memory_window: usize) -> Self {
        Self {
            history: Vec::new(),
            memory: ConversationMemory::new(memory_window),
            model: model.into(),
        }
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Drops displayed history and the memory window. The model choice stays.
    pub fn clear(&mut self) {
        self.history.clear();
        self.memory.clear();
    }

    fn record(&mut self, query: &str, answer: &Answer) {
        self.memory.push(query, answer.text.clone());
        self.history.push(Exchange {
            query: query.to_string(),
            response: answer.text.clone(),
            figure: answer.figure.clone(),
        });
    }
}

/// Service handles plus retrieval settings.
pub struct Chatbot {
    embedder: Box<dyn Embedder>,
    store: Box<dyn VectorStore>,
    chat: Box<dyn ChatModel>,
    namespace: String,
    top_k: usize,
}

impl Chatbot {
    pub fn new(
        embedder: Box<dyn Embedder>,
        store: Box<dyn VectorStore>,
        chat: Box<dyn ChatModel>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            namespace: namespace.into(),
            top_k,
        }
    }

    /// A fresh session on this bot's default model.
    pub fn new_session(&self, memory_window: usize) -> ChatSession {
        ChatSession::new(self.chat.default_model(), memory_window)
    }

    pub fn default_model(&self) -> &str {
        self.chat.default_model()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Retrieves context, generates an answer and records the exchange.
    ///
    /// When a retrieved chunk cites a figure, that chunk's whole page becomes
    /// the context and its image (if still on disk) is returned with the answer.
    /// On error the session is left unchanged.
    pub async fn ask(&self, session: &mut ChatSession, question: &str) -> Result<Answer, Error> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }
        let matches = retrieve(
            question,
            self.embedder.as_ref(),
            self.store.as_ref(),
            &self.namespace,
            self.top_k,
        )
        .await?;

        let (context, figure) = match matches.iter().find(|m| m.metadata.figure_reference.is_some()) {
            Some(m) => {
                let hit = figure_hit(m);
                info!(citation = %hit.citation, image = ?hit.image, "answering from figure page");
                (m.metadata.text.clone(), Some(hit))
            }
            None => (format_context(&matches), None),
        };

        let messages = build_messages(question, &context, session.memory());
        debug!(messages = messages.len(), context_chars = context.len(), model = session.model(), "generating");
        let text = self.chat.complete(session.model(), &messages).await?;

        let answer = Answer {
            text,
            sources: matches
                .iter()
                .map(|m| SourceRef {
                    source: m.metadata.source.clone(),
                    page: m.metadata.page,
                    score: m.score,
                })
                .collect(),
            figure,
        };
        session.record(question, &answer);
        Ok(answer)
    }
}

fn figure_hit(m: &Match) -> FigureHit {
    let citation = m.metadata.figure_reference.clone().unwrap_or_default();
    let image = m.metadata.figure_image.as_ref().map(PathBuf::from).filter(|p| {
        let exists = p.is_file();
        if !exists {
            warn!(image = %p.display(), %citation, "figure image missing, answering without it");
        }
        exists
    });
    FigureHit { citation, image }
}
