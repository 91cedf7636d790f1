//! External service adapters
//!
//! One-shot HTTP calls with fixed contracts: model catalog, chat completion
//! and contradiction classification. Adapters neither retry nor cache.

mod classifier;
mod error;
mod ollama;
mod types;

pub use classifier::ClassifierService;
pub use error::{ServiceError, ServiceErrorKind};
pub use ollama::OllamaService;
pub use types::ContradictionInput;

/// Read the body of a response, turning non-2xx statuses into errors
async fn read_success_body(
    service: &str,
    response: reqwest::Response,
) -> Result<String, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::from_transport(service, &e))?;

    if status.is_success() {
        Ok(body)
    } else {
        tracing::warn!(service, status = %status, "Service returned error status");
        Err(ServiceError::from_status(service, status, &body))
    }
}
