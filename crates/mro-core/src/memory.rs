//! Sliding window over the most recent chat exchanges.

use std::collections::VecDeque;

use crate::chat::ChatMessage;

/// One question and the answer it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// Keeps at most `window` exchanges; pushing past that drops the oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMemory {
    window: usize,
    turns: VecDeque<Turn>,
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.window == 0 {
            return;
        }
        while self.turns.len() >= self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The window as alternating user / assistant messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|t| [ChatMessage::user(&t.user), ChatMessage::assistant(&t.assistant)])
            .collect()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
