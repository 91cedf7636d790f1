//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{DialogueHandle, DialogueRuntime, SseEvent};
use crate::conversation::{Message, Verdict};
use crate::services::{ContradictionInput, ServiceError};
use crate::speech::SpeechCommand;
use crate::state_machine::{DialogueContext, DialogueState, Event};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Mock Speech Channel
// ============================================================================

/// Speech channel that records commands; tests play the speech subsystem
#[derive(Default)]
pub struct MockSpeech {
    commands: Mutex<Vec<SpeechCommand>>,
}

impl MockSpeech {
    pub fn recorded_commands(&self) -> Vec<SpeechCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechChannel for MockSpeech {
    async fn send(&self, command: SpeechCommand) -> Result<(), String> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

// ============================================================================
// Mock Model Catalog
// ============================================================================

/// Catalog returning a fixed result
pub struct MockCatalog {
    result: Result<Vec<String>, ServiceError>,
}

impl MockCatalog {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            result: Ok(models.iter().map(ToString::to_string).collect()),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self { result: Err(error) }
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::with_models(&["llama3:latest"])
    }
}

#[async_trait]
impl ModelCatalog for MockCatalog {
    async fn list_models(&self) -> Result<Vec<String>, ServiceError> {
        self.result.clone()
    }
}

// ============================================================================
// Mock Chat Client
// ============================================================================

/// Chat client that returns queued replies
pub struct MockChat {
    responses: Mutex<VecDeque<Result<Message, ServiceError>>>,
    model_id: String,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl MockChat {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold every reply for `delay` before returning it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Message::assistant(content)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: ServiceError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn complete(&self, messages: &[Message]) -> Result<Message, ServiceError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Contradiction Classifier
// ============================================================================

/// Classifier that returns queued verdicts
#[derive(Default)]
pub struct MockClassifier {
    responses: Mutex<VecDeque<Result<Verdict, ServiceError>>>,
    /// Record of all inputs classified
    pub inputs: Mutex<Vec<ContradictionInput>>,
}

impl MockClassifier {
    pub fn queue_verdict(&self, verdict: Verdict) {
        self.responses.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn queue_error(&self, error: ServiceError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_inputs(&self) -> Vec<ContradictionInput> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContradictionClassifier for MockClassifier {
    async fn classify(&self, input: &ContradictionInput) -> Result<Verdict, ServiceError> {
        self.inputs.lock().unwrap().push(input.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock verdict queued")))
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub handle: DialogueHandle,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub speech: Arc<MockSpeech>,
    pub catalog: Arc<MockCatalog>,
    pub chat: Arc<MockChat>,
    pub classifier: Arc<MockClassifier>,
    runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }
}

#[derive(Default)]
pub struct TestRuntimeBuilder {
    system_prompt: Option<String>,
    catalog: Option<MockCatalog>,
    chat: Option<MockChat>,
    classifier: Option<MockClassifier>,
}

impl TestRuntimeBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn catalog(mut self, catalog: MockCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn chat(mut self, chat: MockChat) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn classifier(mut self, classifier: MockClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> TestRuntime {
        let speech = Arc::new(MockSpeech::default());
        let catalog = Arc::new(self.catalog.unwrap_or_default());
        let chat = Arc::new(
            self.chat
                .unwrap_or_else(|| MockChat::new("llama3:latest")),
        );
        let classifier = Arc::new(self.classifier.unwrap_or_default());

        let context = DialogueContext::new(
            "test-dialogue",
            self.system_prompt.unwrap_or_else(|| "Hello!".to_string()),
        );
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = DialogueRuntime::new(
            context,
            speech.clone(),
            catalog.clone(),
            chat.clone(),
            classifier.clone(),
            event_rx,
            event_tx,
            broadcast_tx,
        );
        let handle = runtime.handle();

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            handle,
            broadcast_rx,
            speech,
            catalog,
            chat,
            classifier,
            runtime_handle,
        }
    }
}

impl TestRuntime {
    /// Queue an event, as the speech subsystem or the user would
    pub async fn send(&self, event: Event) {
        self.handle
            .send_event(event)
            .await
            .expect("Failed to send event");
    }

    /// Wait until the dialogue reaches the named state
    pub async fn wait_for_state(&self, expected: &str, timeout: Duration) -> bool {
        let mut rx = self.handle.snapshot_receiver();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| s.state.name() == expected)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Wait until the history holds `count` messages
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> bool {
        let mut rx = self.handle.snapshot_receiver();
        let reached = matches!(
            tokio::time::timeout(
                timeout,
                rx.wait_for(|s| s.conversation.messages().len() >= count)
            )
            .await,
            Ok(Ok(_))
        );
        reached
    }

    /// Wait for the next error published to subscribers
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SseEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }

    pub fn state(&self) -> DialogueState {
        self.handle.snapshot().state
    }

    pub fn messages(&self) -> Vec<Message> {
        self.handle.snapshot().conversation.messages().to_vec()
    }

    pub fn is_finished(&self) -> bool {
        self.runtime_handle.is_finished()
    }

    /// Drive start-up and the spoken prompt until the first Ask
    pub async fn reach_ask(&self) {
        self.send(Event::SpeechReady).await;
        assert!(self.wait_for_state("prompt", WAIT).await);
        self.send(Event::Advance).await;
        assert!(self.wait_for_state("speak_prompt", WAIT).await);
        self.send(Event::SpeakComplete).await;
        assert!(self.wait_for_state("ask", WAIT).await);
    }
}

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[tokio::test]
    async fn test_full_turn() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_reply("Lovely weather.");
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::NoContradiction);

        let rt = TestRuntime::new()
            .catalog(MockCatalog::with_models(&["llama3"]))
            .chat(chat)
            .classifier(classifier)
            .build();

        rt.send(Event::SpeechReady).await;
        assert!(rt.wait_for_state("prompt", WAIT).await);
        assert_eq!(rt.messages(), vec![Message::system("Hello!")]);
        assert!(rt
            .handle
            .snapshot()
            .conversation
            .ollama_models()
            .contains("llama3"));

        rt.send(Event::Advance).await;
        rt.send(Event::SpeakComplete).await;
        assert!(rt.wait_for_state("ask", WAIT).await);

        rt.send(Event::Recognised {
            utterance: "it is sunny".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);

        let inputs = rt.classifier.recorded_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].utterances, vec!["it is sunny.".to_string()]);
        assert_eq!(inputs[0].annotation_target_pair, [0, 0]);

        let requests = rt.chat.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0],
            vec![
                Message::system("Note: the last user message is classified as no_contradiction."),
                Message::system("Hello!"),
                Message::user("it is sunny"),
            ]
        );

        assert_eq!(
            rt.messages(),
            vec![
                Message::system("Hello!"),
                Message::user("it is sunny"),
                Message::assistant("Lovely weather."),
            ]
        );
        assert_eq!(
            rt.speech.recorded_commands(),
            vec![
                SpeechCommand::Prepare,
                SpeechCommand::speak("Hello!"),
                SpeechCommand::Listen,
                SpeechCommand::speak("Lovely weather."),
            ]
        );

        // Loop continues
        rt.send(Event::SpeakComplete).await;
        assert!(rt.wait_for_state("ask", WAIT).await);
        assert_eq!(rt.speech.recorded_commands().last(), Some(&SpeechCommand::Listen));
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_previous_verdict() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_reply("Really?");
        chat.queue_reply("I see.");
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::Contradiction);
        classifier.queue_error(ServiceError::network("connection refused"));

        let rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "I love cats".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);
        rt.send(Event::SpeakComplete).await;
        assert!(rt.wait_for_state("ask", WAIT).await);

        rt.send(Event::Recognised {
            utterance: "I hate cats".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);

        let inputs = rt.classifier.recorded_inputs();
        assert_eq!(
            inputs[1].utterances,
            vec!["I love cats.".to_string(), "I hate cats.".to_string()]
        );
        assert_eq!(inputs[1].annotation_target_pair, [0, 1]);

        let requests = rt.chat.recorded_requests();
        assert_eq!(
            requests[1][0],
            Message::system("Note: the last user message is classified as contradiction.")
        );
        assert_eq!(
            rt.handle.snapshot().conversation.last_contradiction(),
            Some(Verdict::Contradiction)
        );
    }

    #[tokio::test]
    async fn test_invalid_classifier_output_proceeds_without_verdict() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_reply("Okay.");
        let classifier = MockClassifier::default();
        classifier.queue_error(ServiceError::invalid_response("prediction: maybe"));

        let rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "hello".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);

        assert_eq!(rt.handle.snapshot().conversation.last_contradiction(), None);
        let requests = rt.chat.recorded_requests();
        assert_eq!(requests[0][0], Message::system("You are a helpful assistant."));
    }

    #[tokio::test]
    async fn test_listen_without_speech_skips_classifier() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_reply("Anyone there?");

        let rt = TestRuntime::new().chat(chat).build();
        rt.reach_ask().await;

        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);

        assert!(rt.classifier.recorded_inputs().is_empty());
        assert_eq!(rt.chat.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_failure_still_prompts() {
        let mut rt = TestRuntime::new()
            .catalog(MockCatalog::failing(ServiceError::network(
                "connection refused",
            )))
            .build();

        rt.send(Event::SpeechReady).await;
        assert!(rt.wait_for_state("prompt", WAIT).await);

        let error = rt.wait_for_error(WAIT).await.unwrap();
        assert!(error.contains("connection refused"));
        assert_eq!(rt.messages(), vec![Message::system("Hello!")]);
        assert!(rt.handle.snapshot().conversation.ollama_models().is_empty());
    }

    #[tokio::test]
    async fn test_no_input_appends_empty_turn() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_reply("Say again?");
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::NoContradiction);

        let rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "first".to_string(),
        })
        .await;
        rt.send(Event::Recognised {
            utterance: "second".to_string(),
        })
        .await;
        rt.send(Event::NoInput).await;
        assert!(rt.wait_for_state("speaking", WAIT).await);

        let users: Vec<String> = rt
            .messages()
            .into_iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content)
            .collect();
        assert_eq!(users, vec!["first", "second", ""]);
        assert_eq!(
            rt.classifier.recorded_inputs()[0].utterances,
            vec!["second.".to_string(), ".".to_string()]
        );
    }

    #[tokio::test]
    async fn test_completion_failure_returns_to_ask() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_error(ServiceError::invalid_request("model not found"));
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::NoContradiction);

        let mut rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "hi".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;

        let error = rt.wait_for_error(WAIT).await.unwrap();
        assert!(error.contains("model not found"));
        assert!(rt.wait_for_state("ask", WAIT).await);

        assert_eq!(rt.chat.recorded_requests().len(), 1);
        assert!(!rt.messages().iter().any(|m| m.role == Role::Assistant));
        let commands = rt.speech.recorded_commands();
        assert_eq!(
            commands
                .iter()
                .filter(|c| **c == SpeechCommand::Listen)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_completion_retried_after_server_error() {
        let chat = MockChat::new("llama3:latest");
        chat.queue_error(ServiceError::server_error("503 Service Unavailable"));
        chat.queue_reply("Back again.");
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::NoContradiction);

        let rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "hi".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;

        assert!(rt.wait_for_state("speaking", Duration::from_secs(5)).await);
        assert_eq!(rt.chat.recorded_requests().len(), 2);
        assert_eq!(
            rt.messages().last(),
            Some(&Message::assistant("Back again."))
        );
    }

    #[tokio::test]
    async fn test_hangup_during_completion() {
        let chat = MockChat::new("llama3:latest").with_delay(Duration::from_secs(10));
        chat.queue_reply("Too late.");
        let classifier = MockClassifier::default();
        classifier.queue_verdict(Verdict::NoContradiction);

        let rt = TestRuntime::new().chat(chat).classifier(classifier).build();
        rt.reach_ask().await;

        rt.send(Event::Recognised {
            utterance: "bye".to_string(),
        })
        .await;
        rt.send(Event::ListenComplete).await;
        assert!(rt.wait_for_state("chat_completion", WAIT).await);

        rt.send(Event::Hangup).await;
        assert!(rt.wait_for_state("done", WAIT).await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rt.is_finished());
        assert!(!rt.messages().iter().any(|m| m.role == Role::Assistant));
    }

    #[tokio::test]
    async fn test_unrelated_events_ignored() {
        let rt = TestRuntime::new().build();

        // Neither belongs to Prepare
        rt.send(Event::Advance).await;
        rt.send(Event::SpeakComplete).await;
        rt.send(Event::SpeechReady).await;
        assert!(rt.wait_for_state("prompt", WAIT).await);

        assert_eq!(rt.state(), DialogueState::Prompt);
        assert_eq!(
            rt.speech.recorded_commands(),
            vec![SpeechCommand::Prepare]
        );
    }
}
