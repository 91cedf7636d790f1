//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::conversation::{Message, Verdict};
use crate::services::{ClassifierService, ContradictionInput, OllamaService, ServiceError};
use crate::speech::SpeechCommand;
use async_trait::async_trait;

/// Outbound side of the speech subsystem
#[async_trait]
pub trait SpeechChannel: Send + Sync {
    /// Deliver a command; signals come back on the event channel
    async fn send(&self, command: SpeechCommand) -> Result<(), String>;
}

/// Source of installed model names
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, ServiceError>;
}

/// Client for chat completions
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Produce the assistant reply for a full message list
    async fn complete(&self, messages: &[Message]) -> Result<Message, ServiceError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Contradiction classifier
#[async_trait]
pub trait ContradictionClassifier: Send + Sync {
    async fn classify(&self, input: &ContradictionInput) -> Result<Verdict, ServiceError>;
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl ModelCatalog for OllamaService {
    async fn list_models(&self) -> Result<Vec<String>, ServiceError> {
        OllamaService::list_models(self).await
    }
}

#[async_trait]
impl ChatClient for OllamaService {
    async fn complete(&self, messages: &[Message]) -> Result<Message, ServiceError> {
        self.chat(messages).await
    }

    fn model_id(&self) -> &str {
        self.model()
    }
}

#[async_trait]
impl ContradictionClassifier for ClassifierService {
    async fn classify(&self, input: &ContradictionInput) -> Result<Verdict, ServiceError> {
        self.predict(input).await
    }
}
