//! Contradiction classifier client

use super::types::{ContradictionInput, ContradictionOutput};
use super::{read_success_body, ServiceError};
use crate::conversation::Verdict;
use reqwest::Client;
use std::time::Duration;

const SERVICE: &str = "classifier";

pub struct ClassifierService {
    client: Client,
    base_url: String,
}

impl ClassifierService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn predict(&self, input: &ContradictionInput) -> Result<Verdict, ServiceError> {
        let url = format!("{}/predict", self.base_url);
        tracing::debug!(utterances = ?input.utterances, pair = ?input.annotation_target_pair, "Classifying");

        let response = self
            .client
            .post(&url)
            .json(input)
            .send()
            .await
            .map_err(|e| ServiceError::from_transport(SERVICE, &e))?;
        let body = read_success_body(SERVICE, response).await?;

        parse_prediction(&body)
    }
}

/// `prediction` must be one of the two literal verdicts
fn parse_prediction(body: &str) -> Result<Verdict, ServiceError> {
    serde_json::from_str::<ContradictionOutput>(body)
        .map(|output| output.prediction)
        .map_err(|e| {
            ServiceError::invalid_response(format!("Not a valid classifier output ({e}): {body}"))
        })
}
