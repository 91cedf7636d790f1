//! Speech subsystem protocol
//!
//! The speech subsystem is an external actor: the dialogue manager sends it
//! commands and receives its signals as events, it never calls into it.

mod console;
mod remote;

pub use console::ConsoleSpeech;
pub use remote::RemoteSpeech;

use crate::state_machine::Event;
use serde::{Deserialize, Serialize};

/// Commands sent to the speech subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeechCommand {
    Prepare,
    Listen,
    Speak { utterance: String },
}

impl SpeechCommand {
    pub fn speak(utterance: impl Into<String>) -> Self {
        SpeechCommand::Speak {
            utterance: utterance.into(),
        }
    }
}

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hypothesis {
    pub utterance: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Signals emitted by the speech subsystem
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SpeechSignal {
    #[serde(rename = "ASRTTS_READY")]
    Ready,
    #[serde(rename = "LISTEN_COMPLETE")]
    ListenComplete,
    #[serde(rename = "RECOGNISED")]
    Recognised { value: Vec<Hypothesis> },
    #[serde(rename = "ASR_NOINPUT")]
    NoInput,
    #[serde(rename = "SPEAK_COMPLETE")]
    SpeakComplete,
}

impl SpeechSignal {
    pub fn into_event(self) -> Event {
        match self {
            SpeechSignal::Ready => Event::SpeechReady,
            SpeechSignal::ListenComplete => Event::ListenComplete,
            // Best hypothesis first; an empty list means nothing was heard
            SpeechSignal::Recognised { value } => match value.into_iter().next() {
                Some(best) => Event::Recognised {
                    utterance: best.utterance,
                },
                None => Event::NoInput,
            },
            SpeechSignal::NoInput => Event::NoInput,
            SpeechSignal::SpeakComplete => Event::SpeakComplete,
        }
    }
}
