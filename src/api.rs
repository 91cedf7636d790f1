//! HTTP control surface for the dialogue
//!
//! Handlers only enqueue events and read snapshots; the store is owned by
//! the runtime.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::config::SpeechMode;
use crate::runtime::DialogueHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dialogue: DialogueHandle,
    pub speech_mode: SpeechMode,
    /// Configured chat model
    pub model: String,
}

impl AppState {
    pub fn new(dialogue: DialogueHandle, speech_mode: SpeechMode, model: impl Into<String>) -> Self {
        Self {
            dialogue,
            speech_mode,
            model: model.into(),
        }
    }
}
