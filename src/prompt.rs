//! Prompt assembly for the chat completion call.
//!
//! Conversation memory is trimmed to a token budget before the retrieved
//! context and the new question are appended, so the prompt stays bounded no
//! matter how long the conversation runs.

use serde::{Deserialize, Serialize};

use crate::chunker::estimate_tokens;

pub const DEFAULT_MAX_MEMORY_TOKENS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Assembles the message list for one completion call:
/// system prompt, trimmed memory, retrieved context, then the new question.
///
/// Memory is kept newest-first: older messages drop out as soon as the next
/// one would push the running token estimate past `max_memory_tokens`.
/// Inputs are not mutated; the caller's history stays intact.
pub fn build_prompt(
    system_prompt: &str,
    memory: &[ConversationMessage],
    context: &str,
    user_message: &str,
    max_memory_tokens: usize,
) -> Vec<ConversationMessage> {
    let mut kept: Vec<&ConversationMessage> = Vec::new();
    let mut token_sum = 0usize;
    for message in memory.iter().rev() {
        let tokens = estimate_tokens(&message.content);
        if token_sum + tokens > max_memory_tokens {
            break;
        }
        token_sum += tokens;
        kept.push(message);
    }
    kept.reverse();

    let mut messages = Vec::with_capacity(kept.len() + 3);
    messages.push(ConversationMessage::new(Role::System, system_prompt));
    messages.extend(kept.into_iter().cloned());
    messages.push(ConversationMessage::new(
        Role::System,
        format!("Context:\n{context}"),
    ));
    messages.push(ConversationMessage::new(Role::User, user_message));
    messages
}
