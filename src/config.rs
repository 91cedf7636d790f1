//! Runtime configuration
//!
//! Everything is read from the environment once at start-up.

use std::time::Duration;
use thiserror::Error;

/// How the speech subsystem is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechMode {
    /// Text stand-in on stdin/stdout
    #[default]
    Console,
    /// External speech client over the HTTP API
    Remote,
}

impl SpeechMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "console" => Some(Self::Console),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Dialogue manager configuration
#[derive(Debug, Clone)]
pub struct DmConfig {
    pub port: u16,
    pub ollama_url: String,
    pub model: String,
    pub temperature: f32,
    pub classifier_url: String,
    /// Content of the system message prepended on every Prompt entry
    pub system_prompt: String,
    pub speech_mode: SpeechMode,
    /// Deadline for the console speech actor before it reports no input
    pub no_input_timeout: Duration,
    pub request_timeout: Duration,
    /// Send the advance signal automatically when Prompt is reached
    pub auto_start: bool,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3:latest".to_string(),
            temperature: 0.8,
            classifier_url: "http://127.0.0.1:8000".to_string(),
            system_prompt: "Hello!".to_string(),
            speech_mode: SpeechMode::Console,
            no_input_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(120),
            auto_start: true,
        }
    }
}

impl DmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let speech_mode = match lookup("DM_SPEECH") {
            Some(value) => SpeechMode::parse(&value).ok_or_else(|| ConfigError::Invalid {
                key: "DM_SPEECH",
                value,
                reason: "expected `console` or `remote`".to_string(),
            })?,
            None => defaults.speech_mode,
        };

        let auto_start = match lookup("DM_AUTO_START") {
            Some(value) => parse_bool("DM_AUTO_START", value)?,
            // Remote clients drive the advance signal themselves
            None => speech_mode == SpeechMode::Console,
        };

        Ok(Self {
            port: parse_or("DM_PORT", lookup("DM_PORT"), defaults.port)?,
            ollama_url: lookup("OLLAMA_URL")
                .map_or(defaults.ollama_url, |url| url.trim_end_matches('/').to_string()),
            model: lookup("DM_MODEL").unwrap_or(defaults.model),
            temperature: parse_or("DM_TEMPERATURE", lookup("DM_TEMPERATURE"), defaults.temperature)?,
            classifier_url: lookup("CLASSIFIER_URL")
                .map_or(defaults.classifier_url, |url| url.trim_end_matches('/').to_string()),
            system_prompt: lookup("DM_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            speech_mode,
            no_input_timeout: lookup("DM_NO_INPUT_TIMEOUT_MS")
                .map(|v| parse_or("DM_NO_INPUT_TIMEOUT_MS", Some(v), 0u64))
                .transpose()?
                .map_or(defaults.no_input_timeout, Duration::from_millis),
            request_timeout: lookup("DM_REQUEST_TIMEOUT_SECS")
                .map(|v| parse_or("DM_REQUEST_TIMEOUT_SECS", Some(v), 0u64))
                .transpose()?
                .map_or(defaults.request_timeout, Duration::from_secs),
            auto_start,
        })
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}
