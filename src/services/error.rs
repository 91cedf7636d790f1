//! Adapter error types

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Failure of a one-shot service call, with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidRequest, message)
    }

    /// The response arrived but does not match the expected contract
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidResponse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unknown, message)
    }

    /// Classify a non-2xx status
    pub fn from_status(service: &str, status: StatusCode, body: &str) -> Self {
        let excerpt: String = body.chars().take(200).collect();
        let message = format!("{service} returned {status}: {excerpt}");
        match status.as_u16() {
            429 => Self::rate_limit(message),
            500..=599 => Self::server_error(message),
            400..=499 => Self::invalid_request(message),
            _ => Self::unknown(message),
        }
    }

    /// Classify a failure to send the request or read the body
    pub fn from_transport(service: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("{service} request timed out: {err}"))
        } else if err.is_connect() {
            Self::network(format!("{service} unreachable: {err}"))
        } else if err.is_request() || err.is_body() || err.is_decode() {
            // Connection dropped mid-exchange
            Self::network(format!("{service} connection failed: {err}"))
        } else {
            Self::unknown(format!("{service} request failed: {err}"))
        }
    }
}

/// Error classification.
///
/// `InvalidResponse` is a schema-validation failure; every other kind is a
/// transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// Endpoint unreachable or timed out - retryable
    Network,
    /// 429 - retryable
    RateLimit,
    /// 5xx - retryable
    ServerError,
    /// Other 4xx - not retryable
    InvalidRequest,
    /// Response body does not match the contract - not retryable
    InvalidResponse,
    Unknown,
}

impl ServiceErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }

    pub fn is_transport(self) -> bool {
        !matches!(self, Self::InvalidResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidResponse => "invalid_response",
            Self::Unknown => "unknown",
        }
    }
}
