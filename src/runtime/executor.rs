//! Dialogue runtime executor

use super::traits::{ChatClient, ContradictionClassifier, ModelCatalog, SpeechChannel};
use super::{DialogueHandle, Snapshot, SseEvent};

use crate::conversation::{ConversationContext, Message};
use crate::state_machine::{
    initial_effects, transition, DialogueContext, DialogueState, Effect, Event, TransitionError,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic dialogue runtime that can work with any speech, catalog, chat and
/// classifier implementations
pub struct DialogueRuntime<S, C, L, K>
where
    S: SpeechChannel + ?Sized + 'static,
    C: ModelCatalog + ?Sized + 'static,
    L: ChatClient + ?Sized + 'static,
    K: ContradictionClassifier + ?Sized + 'static,
{
    context: DialogueContext,
    state: DialogueState,
    conversation: ConversationContext,
    speech: Arc<S>,
    catalog: Arc<C>,
    chat: Arc<L>,
    classifier: Arc<K>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
    /// Token shared by every in-flight adapter request
    cancel_token: CancellationToken,
}

impl<S, C, L, K> DialogueRuntime<S, C, L, K>
where
    S: SpeechChannel + ?Sized + 'static,
    C: ModelCatalog + ?Sized + 'static,
    L: ChatClient + ?Sized + 'static,
    K: ContradictionClassifier + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: DialogueContext,
        speech: Arc<S>,
        catalog: Arc<C>,
        chat: Arc<L>,
        classifier: Arc<K>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::new(&context.conversation_id));
        Self {
            context,
            state: DialogueState::default(),
            conversation: ConversationContext::new(),
            speech,
            catalog,
            chat,
            classifier,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Handle for enqueuing events and observing the dialogue
    pub fn handle(&self) -> DialogueHandle {
        DialogueHandle::new(
            self.event_tx.clone(),
            self.broadcast_tx.clone(),
            self.snapshot_tx.subscribe(),
        )
    }

    pub async fn run(mut self) {
        tracing::info!(conversation_id = %self.context.conversation_id, "Starting dialogue runtime");

        if let Err(e) = self.execute_effects(initial_effects()).await {
            self.report_failure(&e);
        }

        // Process events in a loop - no recursion
        while !self.state.is_terminal() {
            let Some(event) = self.event_rx.recv().await else {
                break;
            };
            if let Err(e) = self.process_event(event).await {
                self.report_failure(&e);
            }
        }

        tracing::info!(conversation_id = %self.context.conversation_id, "Dialogue runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), String> {
        // Effects may generate events that must be handled before the next
        // queued one
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let event_kind = current_event.kind();

            // Pure state transition
            let result = match transition(
                &self.state,
                &self.context,
                &self.conversation,
                current_event,
            ) {
                Ok(r) => r,
                Err(e @ (TransitionError::Unexpected { .. } | TransitionError::Terminal)) => {
                    tracing::debug!(
                        state = self.state.name(),
                        event = event_kind,
                        reason = %e,
                        "Ignoring event"
                    );
                    continue;
                }
            };

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state != self.state {
                tracing::info!(
                    from = old_state.name(),
                    to = self.state.name(),
                    in_main = self.state.in_main(),
                    event = event_kind,
                    "State transition"
                );
            }

            // Execute effects and collect generated events
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await? {
                    events_to_process.push(generated_event);
                }
            }

            self.publish_snapshot();
        }

        Ok(())
    }

    async fn execute_effects(&mut self, effects: Vec<Effect>) -> Result<(), String> {
        let mut generated = Vec::new();
        for effect in effects {
            if let Some(event) = self.execute_effect(effect).await? {
                generated.push(event);
            }
        }
        self.publish_snapshot();

        for event in generated {
            self.process_event(event).await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, String> {
        match effect {
            Effect::SendSpeech { command } => {
                tracing::debug!(?command, "Sending speech command");
                self.speech.send(command).await?;
                Ok(None)
            }

            Effect::FetchModels => {
                let catalog = self.catalog.clone();
                let event_tx = self.event_tx.clone();
                let cancel_token = self.cancel_token.clone();

                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::debug!("Model catalog request cancelled");
                        }

                        result = catalog.list_models() => {
                            let event = match result {
                                Ok(models) => Event::ModelsLoaded { models },
                                Err(e) => {
                                    tracing::warn!(
                                        error = %e,
                                        kind = e.kind.as_str(),
                                        "Model catalog unavailable, continuing without it"
                                    );
                                    Event::ModelsFailed { message: e.message }
                                }
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });

                // Return None - the event will come from the spawned task
                Ok(None)
            }

            Effect::RecordModels { models } => {
                self.conversation.set_models(models);
                let model = self.chat.model_id();
                if !self.conversation.ollama_models().contains(model) {
                    tracing::warn!(
                        model,
                        available = ?self.conversation.ollama_models(),
                        "Configured chat model is not installed"
                    );
                }
                Ok(None)
            }

            Effect::PrependSystemPrompt { content } => {
                self.conversation.prepend_system(content.clone());
                let _ = self.broadcast_tx.send(SseEvent::Message {
                    message: Message::system(content),
                });
                Ok(None)
            }

            Effect::AppendMessage { message } => {
                self.conversation.append(message.clone());
                tracing::debug!(
                    role = ?message.role,
                    history = self.conversation.messages().len(),
                    "Message appended"
                );
                let _ = self.broadcast_tx.send(SseEvent::Message { message });
                Ok(None)
            }

            Effect::ClassifyContradiction => {
                let Some(input) = self.conversation.contradiction_input() else {
                    tracing::debug!("No user utterance to classify");
                    return Ok(Some(Event::ClassifierSkipped));
                };

                let classifier = self.classifier.clone();
                let event_tx = self.event_tx.clone();
                let cancel_token = self.cancel_token.clone();

                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::debug!("Contradiction request cancelled");
                        }

                        result = classifier.classify(&input) => {
                            let event = match result {
                                Ok(verdict) => Event::VerdictReady { verdict },
                                Err(e) => Event::ClassifierFailed {
                                    message: e.message,
                                    error_kind: e.kind,
                                },
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });

                Ok(None)
            }

            Effect::RecordVerdict { verdict } => {
                tracing::info!(
                    verdict = %verdict,
                    previous = ?self.conversation.last_contradiction(),
                    "Contradiction verdict"
                );
                self.conversation.record_verdict(verdict);
                Ok(None)
            }

            Effect::NoteClassifierFailure {
                message,
                error_kind,
            } => {
                tracing::warn!(
                    error = %message,
                    kind = error_kind.as_str(),
                    transport = error_kind.is_transport(),
                    previous = ?self.conversation.last_contradiction(),
                    "Contradiction check failed, keeping previous verdict"
                );
                Ok(None)
            }

            Effect::RequestCompletion => {
                let messages = self.conversation.completion_messages();
                let chat = self.chat.clone();
                let event_tx = self.event_tx.clone();
                let cancel_token = self.cancel_token.clone();
                let current_attempt = match &self.state {
                    DialogueState::ChatCompletion { attempt } => *attempt,
                    _ => 1,
                };

                tokio::spawn(async move {
                    tracing::info!(
                        attempt = current_attempt,
                        messages = messages.len(),
                        "Requesting chat completion (background)"
                    );

                    // Race the request against cancellation
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!("Chat completion cancelled");
                        }

                        result = chat.complete(&messages) => {
                            let event = match result {
                                Ok(reply) => Event::CompletionReady { reply },
                                Err(e) => {
                                    tracing::warn!(
                                        error = %e,
                                        kind = e.kind.as_str(),
                                        attempt = current_attempt,
                                        "Chat completion failed"
                                    );
                                    Event::CompletionFailed {
                                        message: e.message,
                                        error_kind: e.kind,
                                        attempt: current_attempt,
                                    }
                                }
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });

                Ok(None)
            }

            Effect::ScheduleRetry { delay, attempt } => {
                tracing::info!(attempt, delay_ms = %delay.as_millis(), "Scheduling completion retry");
                let event_tx = self.event_tx.clone();
                let cancel_token = self.cancel_token.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel_token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::RetryTimeout { attempt }).await;
                        }
                    }
                });
                Ok(None)
            }

            Effect::PublishState => {
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    state: self.state.clone(),
                });
                Ok(None)
            }

            Effect::ReportError { message } => {
                tracing::warn!(error = %message, "Turn error");
                let _ = self.broadcast_tx.send(SseEvent::Error { message });
                Ok(None)
            }

            Effect::AbortRequests => {
                tracing::info!("Aborting in-flight requests");
                self.cancel_token.cancel();
                self.cancel_token = CancellationToken::new();
                Ok(None)
            }
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(Snapshot {
            conversation_id: self.context.conversation_id.clone(),
            state: self.state.clone(),
            conversation: self.conversation.clone(),
            updated_at: Utc::now(),
        });
    }

    fn report_failure(&self, message: &str) {
        tracing::error!(error = %message, "Error handling event");
        let _ = self.broadcast_tx.send(SseEvent::Error {
            message: message.to_string(),
        });
    }
}
