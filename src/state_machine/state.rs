//! Dialogue state types

use serde::{Deserialize, Serialize};

/// Dialogue state.
///
/// `Prompt` through `Speaking` make up the main loop, entered once after
/// start-up; `Done` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueState {
    /// Waiting for the speech subsystem to become ready
    #[default]
    Prepare,

    /// Model catalog request in flight
    GetModels,

    /// System prompt injected, waiting for the user to start
    Prompt,

    /// Uttering the system prompt
    SpeakPrompt,

    /// Listening; recognised utterances are appended as they arrive
    Ask,

    /// Classifier request in flight
    CheckContradiction,

    /// Completion request in flight, with retry tracking
    ChatCompletion { attempt: u32 },

    /// Uttering the assistant reply
    Speaking,

    /// Conversation over
    Done,
}

impl DialogueState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DialogueState::Done)
    }

    /// Whether the main loop has been entered
    pub fn in_main(&self) -> bool {
        matches!(
            self,
            DialogueState::Prompt
                | DialogueState::SpeakPrompt
                | DialogueState::Ask
                | DialogueState::CheckContradiction
                | DialogueState::ChatCompletion { .. }
                | DialogueState::Speaking
        )
    }

    /// Stable name, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::Prepare => "prepare",
            DialogueState::GetModels => "get_models",
            DialogueState::Prompt => "prompt",
            DialogueState::SpeakPrompt => "speak_prompt",
            DialogueState::Ask => "ask",
            DialogueState::CheckContradiction => "check_contradiction",
            DialogueState::ChatCompletion { .. } => "chat_completion",
            DialogueState::Speaking => "speaking",
            DialogueState::Done => "done",
        }
    }
}

/// Immutable configuration of one dialogue
#[derive(Debug, Clone)]
pub struct DialogueContext {
    pub conversation_id: String,
    /// Injected at the head of the history on Prompt entry
    pub system_prompt: String,
}

impl DialogueContext {
    pub fn new(conversation_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            system_prompt: system_prompt.into(),
        }
    }
}
