//! Events that can occur in a dialogue

use crate::conversation::{Message, Verdict};
use crate::services::ServiceErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Speech subsystem signals
    SpeechReady,
    SpeakComplete,
    Recognised {
        utterance: String,
    },
    /// The speech subsystem's no-input deadline expired
    NoInput,
    ListenComplete,

    // User events
    /// The external "advance" signal that starts the conversation
    Advance,
    Hangup,

    // Model catalog
    ModelsLoaded {
        models: Vec<String>,
    },
    ModelsFailed {
        message: String,
    },

    // Contradiction classifier
    VerdictReady {
        verdict: Verdict,
    },
    ClassifierFailed {
        message: String,
        error_kind: ServiceErrorKind,
    },
    /// No user utterance to classify yet
    ClassifierSkipped,

    // Chat completion
    CompletionReady {
        reply: Message,
    },
    CompletionFailed {
        message: String,
        error_kind: ServiceErrorKind,
        attempt: u32,
    },
    RetryTimeout {
        attempt: u32,
    },
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SpeechReady => "speech_ready",
            Event::SpeakComplete => "speak_complete",
            Event::Recognised { .. } => "recognised",
            Event::NoInput => "no_input",
            Event::ListenComplete => "listen_complete",
            Event::Advance => "advance",
            Event::Hangup => "hangup",
            Event::ModelsLoaded { .. } => "models_loaded",
            Event::ModelsFailed { .. } => "models_failed",
            Event::VerdictReady { .. } => "verdict_ready",
            Event::ClassifierFailed { .. } => "classifier_failed",
            Event::ClassifierSkipped => "classifier_skipped",
            Event::CompletionReady { .. } => "completion_ready",
            Event::CompletionFailed { .. } => "completion_failed",
            Event::RetryTimeout { .. } => "retry_timeout",
        }
    }
}
