//! Effects produced by state transitions

use crate::conversation::{Message, Verdict};
use crate::services::ServiceErrorKind;
use crate::speech::SpeechCommand;
use std::time::Duration;

/// Effects to be executed, in order, after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a command to the speech subsystem
    SendSpeech { command: SpeechCommand },

    /// Request the model catalog (spawns as background task)
    FetchModels,

    /// Store the catalog names
    RecordModels { models: Vec<String> },

    /// Insert a system message at the head of the history
    PrependSystemPrompt { content: String },

    /// Append a message to the history
    AppendMessage { message: Message },

    /// Classify the latest user utterances (spawns as background task)
    ClassifyContradiction,

    /// Overwrite the stored verdict
    RecordVerdict { verdict: Verdict },

    /// Log a classifier failure; the stored verdict is left alone
    NoteClassifierFailure {
        message: String,
        error_kind: ServiceErrorKind,
    },

    /// Request an assistant reply (spawns as background task)
    RequestCompletion,

    /// Schedule a completion retry
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Publish the new state to subscribers
    PublishState,

    /// Publish an error on the user-visible channel
    ReportError { message: String },

    /// Drop the results of every in-flight adapter request
    AbortRequests,
}

impl Effect {
    pub fn prepare_speech() -> Self {
        Effect::SendSpeech {
            command: SpeechCommand::Prepare,
        }
    }

    pub fn listen() -> Self {
        Effect::SendSpeech {
            command: SpeechCommand::Listen,
        }
    }

    pub fn speak(utterance: impl Into<String>) -> Self {
        Effect::SendSpeech {
            command: SpeechCommand::speak(utterance),
        }
    }

    pub fn append_user(utterance: impl Into<String>) -> Self {
        Effect::AppendMessage {
            message: Message::user(utterance),
        }
    }

    pub fn report_error(message: impl Into<String>) -> Self {
        Effect::ReportError {
            message: message.into(),
        }
    }
}
