//! Wire types for the external services

use crate::conversation::{Message, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /api/tags` response
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<ModelTag>,
}

/// Catalog entry; only the name is used
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

/// `POST /api/chat` request
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
    pub messages: &'a [Message],
    pub temperature: f32,
}

/// `POST /api/chat` response, left loose so validation can report what is wrong
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub role: String,
    pub content: Value,
}

/// `POST /predict` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionInput {
    pub utterances: Vec<String>,
    /// First and last index of the selected window; the last one is the target
    pub annotation_target_pair: [usize; 2],
}

/// `POST /predict` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContradictionOutput {
    pub prediction: Verdict,
}
