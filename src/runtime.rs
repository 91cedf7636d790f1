//! Runtime for executing dialogues
//!
//! One runtime drives one dialogue: it owns the state and the conversation
//! store, applies transitions in arrival order and runs adapter calls as
//! background tasks whose results come back as events.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::DialogueRuntime;
pub use traits::*;

use crate::conversation::{ConversationContext, Message};
use crate::services::{ClassifierService, OllamaService};
use crate::speech::SpeechCommand;
use crate::state_machine::{DialogueState, Event};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    DialogueRuntime<dyn SpeechChannel, OllamaService, OllamaService, ClassifierService>;

/// Point-in-time view of a dialogue
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub conversation_id: String,
    pub state: DialogueState,
    pub conversation: ConversationContext,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state: DialogueState::default(),
            conversation: ConversationContext::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Events sent to subscription clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: Snapshot },
    StateChange { state: DialogueState },
    Message { message: Message },
    SpeechCommand { command: SpeechCommand },
    Error { message: String },
}

/// Handle to interact with a running dialogue
#[derive(Clone)]
pub struct DialogueHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_rx: watch::Receiver<Snapshot>,
}

impl DialogueHandle {
    pub(crate) fn new(
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        snapshot_rx: watch::Receiver<Snapshot>,
    ) -> Self {
        Self {
            event_tx,
            broadcast_tx,
            snapshot_rx,
        }
    }

    /// Queue an event for the runtime
    pub async fn send_event(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to dialogue updates
    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn snapshot_receiver(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }
}
