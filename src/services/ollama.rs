//! Ollama model catalog and chat completion

use super::types::{ChatRequest, ChatResponse, TagsResponse};
use super::{read_success_body, ServiceError};
use crate::conversation::{Message, Role};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

const SERVICE: &str = "ollama";

/// Client for an Ollama server
pub struct OllamaService {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaService {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fetch the names of the locally available models
    pub async fn list_models(&self) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::from_transport(SERVICE, &e))?;
        let body = read_success_body(SERVICE, response).await?;

        let tags: TagsResponse = serde_json::from_str(&body).map_err(|e| {
            ServiceError::invalid_response(format!("Malformed model catalog: {e}"))
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Request one non-streamed assistant reply for `messages`
    pub async fn chat(&self, messages: &[Message]) -> Result<Message, ServiceError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            stream: false,
            messages,
            temperature: self.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::from_transport(SERVICE, &e))?;
        let body = read_success_body(SERVICE, response).await?;
        let reply = parse_chat_reply(&body)?;

        tracing::info!(
            model = %self.model,
            duration_ms = %start.elapsed().as_millis(),
            history = messages.len(),
            reply_chars = reply.content.chars().count(),
            "Chat completion finished"
        );

        Ok(reply)
    }
}

/// Accept exactly one textual assistant reply
fn parse_chat_reply(body: &str) -> Result<Message, ServiceError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::invalid_response(format!("Malformed chat response: {e}")))?;

    let reply = response
        .message
        .ok_or_else(|| ServiceError::invalid_response("Chat response has no message"))?;

    if reply.role != "assistant" {
        return Err(ServiceError::invalid_response(format!(
            "Expected an assistant reply, got role {:?}",
            reply.role
        )));
    }

    match reply.content {
        Value::String(text) => Ok(Message {
            role: Role::Assistant,
            content: text,
        }),
        other => Err(ServiceError::invalid_response(format!(
            "Chat reply content is not text: {other}"
        ))),
    }
}
