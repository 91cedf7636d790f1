//! Pure state transition function
//!
//! Given the same state, store and event it always produces the same
//! outputs. The store is only read here; every mutation is an effect.

use super::{DialogueContext, DialogueState, Effect, Event};
use crate::conversation::{ConversationContext, Message};
use std::time::Duration;
use thiserror::Error;

pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogueState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogueState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Event {event} is not handled in state {state}")]
    Unexpected {
        state: &'static str,
        event: &'static str,
    },
    #[error("Conversation is over")]
    Terminal,
}

/// Entry actions of the initial state
pub fn initial_effects() -> Vec<Effect> {
    vec![Effect::PublishState, Effect::prepare_speech()]
}

/// Pure transition function
pub fn transition(
    state: &DialogueState,
    context: &DialogueContext,
    conversation: &ConversationContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (DialogueState::Done, _) => Err(TransitionError::Terminal),

        // Hangup ends the conversation from anywhere
        (_, Event::Hangup) => Ok(TransitionResult::new(DialogueState::Done)
            .with_effect(Effect::AbortRequests)
            .with_effect(Effect::PublishState)),

        // ============================================================
        // Start-up
        // ============================================================
        (DialogueState::Prepare, Event::SpeechReady) => {
            Ok(TransitionResult::new(DialogueState::GetModels)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::FetchModels))
        }

        (DialogueState::GetModels, Event::ModelsLoaded { models }) => {
            Ok(TransitionResult::new(DialogueState::Prompt)
                .with_effect(Effect::RecordModels { models })
                .with_effects(enter_prompt(context)))
        }

        // Catalog failure: proceed with an empty catalog
        (DialogueState::GetModels, Event::ModelsFailed { message }) => {
            Ok(TransitionResult::new(DialogueState::Prompt)
                .with_effect(Effect::report_error(format!(
                    "Could not load model catalog: {message}"
                )))
                .with_effects(enter_prompt(context)))
        }

        // ============================================================
        // Main loop
        // ============================================================
        (DialogueState::Prompt, Event::Advance) => {
            let utterance = conversation
                .first_message()
                .map_or(context.system_prompt.as_str(), |m| m.content.as_str())
                .to_string();
            Ok(TransitionResult::new(DialogueState::SpeakPrompt)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::speak(utterance)))
        }

        (DialogueState::SpeakPrompt, Event::SpeakComplete)
        | (DialogueState::Speaking, Event::SpeakComplete) => {
            Ok(TransitionResult::new(DialogueState::Ask)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::listen()))
        }

        // Recognition keeps listening; the turn ends on LISTEN_COMPLETE
        (DialogueState::Ask, Event::Recognised { utterance }) => {
            Ok(TransitionResult::new(DialogueState::Ask)
                .with_effect(Effect::append_user(utterance)))
        }

        // Silence is recorded as an empty user turn
        (DialogueState::Ask, Event::NoInput) => {
            Ok(TransitionResult::new(DialogueState::CheckContradiction)
                .with_effect(Effect::append_user(""))
                .with_effect(Effect::PublishState)
                .with_effect(Effect::ClassifyContradiction))
        }

        (DialogueState::Ask, Event::ListenComplete) => {
            Ok(TransitionResult::new(DialogueState::CheckContradiction)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::ClassifyContradiction))
        }

        (DialogueState::CheckContradiction, Event::VerdictReady { verdict }) => {
            Ok(TransitionResult::new(DialogueState::ChatCompletion { attempt: 1 })
                .with_effect(Effect::RecordVerdict { verdict })
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestCompletion))
        }

        // No new verdict: the previous one stays in the store
        (DialogueState::CheckContradiction, Event::ClassifierFailed { message, error_kind }) => {
            Ok(TransitionResult::new(DialogueState::ChatCompletion { attempt: 1 })
                .with_effect(Effect::NoteClassifierFailure {
                    message,
                    error_kind,
                })
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestCompletion))
        }

        (DialogueState::CheckContradiction, Event::ClassifierSkipped) => {
            Ok(TransitionResult::new(DialogueState::ChatCompletion { attempt: 1 })
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestCompletion))
        }

        (DialogueState::ChatCompletion { .. }, Event::CompletionReady { reply }) => {
            let utterance = reply.content.clone();
            Ok(TransitionResult::new(DialogueState::Speaking)
                .with_effect(Effect::AppendMessage {
                    message: Message::assistant(reply.content),
                })
                .with_effect(Effect::PublishState)
                .with_effect(Effect::speak(utterance)))
        }

        // ============================================================
        // Completion retry
        // ============================================================
        (
            DialogueState::ChatCompletion { attempt },
            Event::CompletionFailed {
                error_kind,
                attempt: failed_attempt,
                ..
            },
        ) if *attempt == failed_attempt
            && error_kind.is_retryable()
            && *attempt < MAX_RETRY_ATTEMPTS =>
        {
            let new_attempt = attempt + 1;
            Ok(
                TransitionResult::new(DialogueState::ChatCompletion {
                    attempt: new_attempt,
                })
                .with_effect(Effect::PublishState)
                .with_effect(Effect::ScheduleRetry {
                    delay: retry_delay(new_attempt),
                    attempt: new_attempt,
                }),
            )
        }

        // Non-retryable or exhausted: fail the turn and listen again
        (
            DialogueState::ChatCompletion { attempt },
            Event::CompletionFailed {
                message,
                error_kind,
                attempt: failed_attempt,
            },
        ) if *attempt == failed_attempt => {
            let error_message = if error_kind.is_retryable() {
                format!("Chat completion failed after {attempt} attempts: {message}")
            } else {
                format!("Chat completion failed: {message}")
            };
            Ok(TransitionResult::new(DialogueState::Ask)
                .with_effect(Effect::report_error(error_message))
                .with_effect(Effect::PublishState)
                .with_effect(Effect::listen()))
        }

        (DialogueState::ChatCompletion { attempt }, Event::RetryTimeout { attempt: retry })
            if *attempt == retry =>
        {
            Ok(TransitionResult::new(DialogueState::ChatCompletion { attempt: *attempt })
                .with_effect(Effect::RequestCompletion))
        }

        (state, event) => Err(TransitionError::Unexpected {
            state: state.name(),
            event: event.kind(),
        }),
    }
}

fn enter_prompt(context: &DialogueContext) -> [Effect; 2] {
    [
        Effect::PrependSystemPrompt {
            content: context.system_prompt.clone(),
        },
        Effect::PublishState,
    ]
}

fn retry_delay(attempt: u32) -> Duration {
    // Backoff before the second and third attempts: 1s, 2s
    Duration::from_secs(1 << attempt.saturating_sub(2))
}
