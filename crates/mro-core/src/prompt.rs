//! Prompt assembly: system prompt, memory window, retrieved context, question.

use std::fmt::Write as _;

use crate::chat::ChatMessage;
use crate::memory::ConversationMemory;
use crate::store::Match;

pub const SYSTEM_PROMPT: &str = "You are an AI assistant that helps aircraft maintenance \
technicians with questions about their maintenance manuals. You provide concise and helpful \
information based on the manual excerpts you are given. If the user asks for information \
outside of your knowledge base, please politely let them know you cannot assist.";

/// Concatenates `Source: …` headers and chunk text, separated by blank lines.
/// No truncation: an oversized context fails at the model.
pub fn format_context(matches: &[Match]) -> String {
    let mut out = String::new();
    for m in matches {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        let _ = write!(out, "Source: {}", m.metadata.source);
        if let Some(page) = m.metadata.page {
            let _ = write!(out, ", page {page}");
        }
        out.push('\n');
        out.push_str(&m.metadata.text);
    }
    out
}

/// `[system, ...memory, user(context + question)]`.
pub fn build_messages(question: &str, context: &str, memory: &ConversationMemory) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(memory.len() * 2 + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(memory.messages());
    let user = if context.trim().is_empty() {
        format!("Context: (no matching manual excerpts)\n\nQuestion: {question}")
    } else {
        format!("Context:\n{context}\n\nQuestion: {question}")
    };
    messages.push(ChatMessage::user(user));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use crate::store::ChunkMetadata;

    fn hit(source: &str, page: Option<u32>, text: &str) -> Match {
        Match {
            id: source.to_string(),
            score: 0.5,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page,
                text: text.to_string(),
                ..ChunkMetadata::default()
            },
        }
    }

    #[test]
    fn context_lists_sources_in_order() {
        let ctx = format_context(&[
            hit("amm.pdf", Some(4), "Brake wear pins."),
            hit("sb-12.txt", None, "Service bulletin 12."),
        ]);
        assert_eq!(
            ctx,
            "Source: amm.pdf, page 4\nBrake wear pins.\n\nSource: sb-12.txt\nService bulletin 12."
        );
    }

    #[test]
    fn messages_wrap_memory_between_system_and_question() {
        let mut memory = ConversationMemory::new(5);
        memory.push("What is a wear pin?", "An indicator.");
        let msgs = build_messages("How long is it?", "Source: a\nx", &memory);

        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1], ChatMessage::user("What is a wear pin?"));
        assert_eq!(msgs[2], ChatMessage::assistant("An indicator."));
        assert_eq!(msgs[3].role, Role::User);
        assert!(msgs[3].content.starts_with("Context:\nSource: a\nx"));
        assert!(msgs[3].content.ends_with("Question: How long is it?"));
    }

    #[test]
    fn empty_context_is_stated() {
        let msgs = build_messages("q", "", &ConversationMemory::new(5));
        assert!(msgs[1].content.contains("no matching manual excerpts"));
    }
}
