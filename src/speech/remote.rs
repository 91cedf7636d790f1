//! Speech subsystem reached over the subscription stream
//!
//! Commands go out as `speech_command` stream events; the remote client
//! posts its signals back through the HTTP API.

use crate::runtime::{SpeechChannel, SseEvent};
use crate::speech::SpeechCommand;
use async_trait::async_trait;
use tokio::sync::broadcast;

pub struct RemoteSpeech {
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl RemoteSpeech {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self { broadcast_tx }
    }
}

#[async_trait]
impl SpeechChannel for RemoteSpeech {
    async fn send(&self, command: SpeechCommand) -> Result<(), String> {
        if self
            .broadcast_tx
            .send(SseEvent::SpeechCommand {
                command: command.clone(),
            })
            .is_err()
        {
            // The client picks the dialogue up from the snapshot on connect
            tracing::warn!(?command, "No speech client connected, command dropped");
        }
        Ok(())
    }
}
