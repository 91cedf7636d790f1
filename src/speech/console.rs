//! Text console stand-in for the speech subsystem
//!
//! Synthesis prints the utterance; recognition takes one line of input
//! within the no-input deadline. Lines are read on a dedicated thread so a
//! pending read never holds up runtime shutdown.

use crate::runtime::SpeechChannel;
use crate::speech::SpeechCommand;
use crate::state_machine::Event;
use async_trait::async_trait;
use std::io::BufRead;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Speech actor bound to stdin and stdout
pub struct ConsoleSpeech {
    command_tx: mpsc::Sender<SpeechCommand>,
}

impl ConsoleSpeech {
    /// Start the actor; its signals are delivered on `event_tx`
    pub fn spawn(
        event_tx: mpsc::Sender<Event>,
        no_input_timeout: Duration,
    ) -> std::io::Result<Self> {
        let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))?;
        let (command_tx, command_rx) = mpsc::channel(8);
        tokio::spawn(run_actor(
            lines,
            tokio::io::stdout(),
            command_rx,
            event_tx,
            no_input_timeout,
        ));
        Ok(Self { command_tx })
    }
}

#[async_trait]
impl SpeechChannel for ConsoleSpeech {
    async fn send(&self, command: SpeechCommand) -> Result<(), String> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| format!("Console speech stopped: {e}"))
    }
}

/// Forward input lines from a detached thread.
///
/// The channel closes on end of input, on a read error, or once the
/// receiver is gone.
fn spawn_line_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (line_tx, line_rx) = mpsc::channel(8);
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if line_tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Console input failed");
                        break;
                    }
                }
            }
        })?;
    Ok(line_rx)
}

async fn run_actor<W>(
    mut lines: mpsc::Receiver<String>,
    mut writer: W,
    mut commands: mpsc::Receiver<SpeechCommand>,
    events: mpsc::Sender<Event>,
    no_input_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let signals = match command {
            SpeechCommand::Prepare => vec![Event::SpeechReady],

            SpeechCommand::Speak { utterance } => {
                if let Err(e) = write_line(&mut writer, &format!("< {utterance}\n")).await {
                    tracing::warn!(error = %e, "Console output failed");
                }
                vec![Event::SpeakComplete]
            }

            SpeechCommand::Listen => {
                if let Err(e) = write_line(&mut writer, "> ").await {
                    tracing::warn!(error = %e, "Console output failed");
                }
                match tokio::time::timeout(no_input_timeout, lines.recv()).await {
                    Err(_) => vec![Event::NoInput],
                    Ok(Some(line)) if line.trim().is_empty() => vec![Event::NoInput],
                    Ok(Some(line)) => vec![
                        Event::Recognised {
                            utterance: line.trim().to_string(),
                        },
                        Event::ListenComplete,
                    ],
                    // End of input ends the conversation
                    Ok(None) => vec![Event::Hangup],
                }
            }
        };

        for signal in signals {
            if events.send(signal).await.is_err() {
                tracing::debug!("Dialogue runtime gone, stopping console speech");
                return;
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
