//! Voice DM - spoken dialogue manager
//!
//! Drives a conversation between a user, a speech subsystem, an Ollama chat
//! model and a contradiction classifier through an explicit turn state
//! machine.

mod api;
mod config;
mod conversation;
mod runtime;
mod services;
mod speech;
mod state_machine;

use api::{create_router, AppState};
use config::{DmConfig, SpeechMode};
use runtime::{DialogueHandle, ProductionRuntime, Snapshot, SpeechChannel};
use services::{ClassifierService, OllamaService};
use speech::{ConsoleSpeech, RemoteSpeech};
use state_machine::{DialogueContext, DialogueState, Event};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_dm=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = DmConfig::from_env()?;
    tracing::info!(
        model = %config.model,
        ollama = %config.ollama_url,
        classifier = %config.classifier_url,
        speech = ?config.speech_mode,
        "Configuration loaded"
    );

    // External services
    let ollama = Arc::new(OllamaService::new(
        &config.ollama_url,
        &config.model,
        config.temperature,
        config.request_timeout,
    )?);
    let classifier = Arc::new(ClassifierService::new(
        &config.classifier_url,
        config.request_timeout,
    )?);

    let (event_tx, event_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);

    // One speech actor per dialogue
    let speech: Arc<dyn SpeechChannel> = match config.speech_mode {
        SpeechMode::Console => Arc::new(ConsoleSpeech::spawn(
            event_tx.clone(),
            config.no_input_timeout,
        )?),
        SpeechMode::Remote => Arc::new(RemoteSpeech::new(broadcast_tx.clone())),
    };

    let context = DialogueContext::new(uuid::Uuid::new_v4().to_string(), &config.system_prompt);
    let runtime: ProductionRuntime = ProductionRuntime::new(
        context,
        speech,
        ollama.clone(),
        ollama,
        classifier,
        event_rx,
        event_tx,
        broadcast_tx,
    );
    let dialogue = runtime.handle();

    let runtime_task = tokio::spawn(async move {
        runtime.run().await;
    });

    if config.auto_start {
        tokio::spawn(auto_advance(dialogue.clone()));
    }

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(
        dialogue.clone(),
        config.speech_mode,
        &config.model,
    ))
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Dialogue manager listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dialogue))
        .await?;

    runtime_task.await?;
    Ok(())
}

/// Send the advance signal once the dialogue is waiting at the prompt
async fn auto_advance(dialogue: DialogueHandle) {
    let mut snapshots = dialogue.snapshot_receiver();
    let reached = snapshots
        .wait_for(|s| s.state == DialogueState::Prompt)
        .await
        .is_ok();
    if !reached {
        return;
    }
    if let Err(e) = dialogue.send_event(Event::Advance).await {
        tracing::warn!(error = %e, "Auto-start failed");
    }
}

/// Resolve on ctrl-c or when the conversation ends, hanging up first
async fn shutdown_signal(dialogue: DialogueHandle) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            let _ = dialogue.send_event(Event::Hangup).await;
        }
        () = conversation_over(dialogue.snapshot_receiver()) => {
            tracing::info!("Conversation over");
        }
    }
}

async fn conversation_over(mut snapshots: watch::Receiver<Snapshot>) {
    let _ = snapshots.wait_for(|s| s.state.is_terminal()).await;
}
