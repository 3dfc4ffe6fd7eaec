//! In-process stand-ins for the hosted services, for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChatMessage, ChatModel};
use crate::embedding::{Embedder, InputKind};
use crate::error::ServiceError;

const DIMS: usize = 64;

/// Bag-of-words embedding: each lower-cased word bumps one of 64 buckets.
/// Same text, same vector; shared words raise similarity.
#[derive(Debug, Default)]
pub(crate) struct HashEmbedder {
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl HashEmbedder {
    /// Succeeds `n` times, then returns a service error on every call.
    pub(crate) fn failing_after(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(n),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let h = word
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ u32::from(b)).wrapping_mul(16777619));
            v[h as usize % DIMS] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str, _kind: InputKind) -> Result<Vec<f32>, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(ServiceError::Status {
                service: "fake-embedder",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(Self::vector(text))
    }

    fn model(&self) -> &str {
        "hash-64"
    }
}

/// Records every prompt and answers `answer N` (N counting from 1).
#[derive(Debug, Default)]
pub(crate) struct ScriptedChat {
    pub(crate) prompts: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    pub(crate) fail: bool,
}

impl ScriptedChat {
    pub(crate) fn last_prompt(&self) -> Vec<ChatMessage> {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|(_, m)| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        if self.fail {
            return Err(ServiceError::Status {
                service: "fake-chat",
                status: 500,
                body: "down".to_string(),
            });
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push((model.to_string(), messages.to_vec()));
        Ok(format!("answer {}", prompts.len()))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}
