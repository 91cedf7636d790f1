//! Conversation store
//!
//! Ordered message history plus the state derived from it. The store has no
//! behaviour of its own: the runtime mutates it only while executing effects
//! emitted by the state machine.

use crate::services::ContradictionInput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Persona used for completion requests when no verdict is available yet
pub const DEFAULT_PERSONA: &str = "You are a helpful assistant.";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

/// Contradiction classifier output for the most recent user utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Contradiction,
    NoContradiction,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Contradiction => "contradiction",
            Verdict::NoContradiction => "no_contradiction",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scratch dialogue state, kept for moves that are not modelled yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationState {
    pub latest_move: String,
}

impl Default for InformationState {
    fn default() -> Self {
        Self {
            latest_move: "ping".to_string(),
        }
    }
}

/// Conversation history and derived state for one dialogue
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationContext {
    messages: Vec<Message>,
    last_contradiction: Option<Verdict>,
    ollama_models: BTreeSet<String>,
    information_state: InformationState,
    last_result: String,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_contradiction(&self) -> Option<Verdict> {
        self.last_contradiction
    }

    pub fn ollama_models(&self) -> &BTreeSet<String> {
        &self.ollama_models
    }

    /// Insert a fresh system message at the head of the history.
    ///
    /// Earlier messages are kept; the new message becomes the active prompt.
    pub fn prepend_system(&mut self, content: impl Into<String>) {
        self.messages.insert(0, Message::system(content));
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn set_models(&mut self, models: impl IntoIterator<Item = String>) {
        self.ollama_models = models.into_iter().collect();
    }

    /// Overwrite the verdict of the previous cycle
    pub fn record_verdict(&mut self, verdict: Verdict) {
        self.last_contradiction = Some(verdict);
    }

    pub fn first_message(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    /// Classifier input built from the last two user utterances.
    ///
    /// Returns `None` when nobody has spoken yet.
    pub fn contradiction_input(&self) -> Option<ContradictionInput> {
        let users: Vec<&Message> = self.user_messages().collect();
        let window = &users[users.len().saturating_sub(2)..];
        if window.is_empty() {
            return None;
        }

        let utterances = window
            .iter()
            .map(|m| terminate_sentence(&m.content))
            .collect();

        Some(ContradictionInput {
            utterances,
            annotation_target_pair: [0, window.len() - 1],
        })
    }

    /// Messages for the next completion request: a system note derived from
    /// the latest verdict, followed by the full history.
    pub fn completion_messages(&self) -> Vec<Message> {
        let note = match self.last_contradiction {
            Some(verdict) => {
                format!("Note: the last user message is classified as {verdict}.")
            }
            None => DEFAULT_PERSONA.to_string(),
        };

        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(note));
        messages.extend(self.messages.iter().cloned());
        messages
    }
}

fn terminate_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with('.') {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}
