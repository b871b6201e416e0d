//! Main entrypoint for the voicelink desktop client.
//!
//! Loads configuration, fetches an ephemeral credential from the token
//! endpoint and runs one realtime voice conversation on the default
//! microphone and speakers until the session closes or Ctrl+C is pressed.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use voicelink::{
    audio::{CpalCaptureDevice, CpalOutput},
    build_protocol,
    config::{Config, Provider},
    token::TokenClient,
    transport::WsConnector,
};
use voicelink_core::{Conversation, ConversationEnd, ConversationEvent, SessionEvent};

/// Realtime voice conversation client
#[derive(Parser)]
#[command(name = "voicelink", version, about)]
struct Cli {
    /// Realtime backend (openai or gemini); overrides REALTIME_PROVIDER
    #[arg(long)]
    provider: Option<Provider>,

    /// Endpoint that mints ephemeral session tokens; overrides TOKEN_URL
    #[arg(long)]
    token_url: Option<String>,

    /// System instructions for the assistant; overrides INSTRUCTIONS
    #[arg(long)]
    instructions: Option<String>,
}

/// Resolves once Ctrl+C is received. If the handler cannot be installed the
/// conversation simply runs until the session ends.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Ending conversation...");
}

fn log_event(event: ConversationEvent) {
    match event {
        ConversationEvent::Session(SessionEvent::Ready) => info!("Session ready; listening"),
        ConversationEvent::Session(SessionEvent::TurnStarted) => info!("Assistant is responding"),
        ConversationEvent::Session(SessionEvent::TranscriptDelta(text)) => {
            info!(%text, "Transcript")
        }
        ConversationEvent::Session(SessionEvent::UtteranceComplete(utterance)) => {
            info!(chunks = utterance.chunk_count, "Assistant turn complete")
        }
        ConversationEvent::Session(SessionEvent::Usage(usage)) => info!(usage = %usage.0, "Usage"),
        ConversationEvent::Session(SessionEvent::ProviderError(message)) => {
            error!(%message, "Provider error")
        }
        ConversationEvent::Session(SessionEvent::ProtocolError(message)) => {
            warn!(%message, "Dropped malformed message")
        }
        ConversationEvent::Session(SessionEvent::Closed(reason)) => {
            info!(?reason, "Session closed")
        }
        ConversationEvent::Session(SessionEvent::TransportError(e)) => {
            error!(error = %e, "Transport error")
        }
        ConversationEvent::Session(SessionEvent::AudioDelta(_)) => {}
        ConversationEvent::PlaybackDrained => info!("Playback finished; listening"),
        ConversationEvent::CaptureFailed(e) => error!(error = %e, "Microphone unavailable"),
        ConversationEvent::PlaybackFailed(e) => error!(error = %e, "Speaker unavailable"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(token_url) = cli.token_url {
        config.token_url = token_url;
    }
    if let Some(instructions) = cli.instructions {
        config.instructions = instructions;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(provider = ?config.provider, "Configuration loaded");

    // --- 3. Obtain an ephemeral credential ---
    let credential = TokenClient::new(config.token_url.clone())
        .fetch()
        .await
        .context("Failed to obtain a session token")?;

    // --- 4. Assemble the conversation ---
    let protocol = build_protocol(&config);
    let output_rate = protocol.audio_format().output_sample_rate;
    let (mut conversation, mut events) = Conversation::new(
        protocol,
        Arc::new(WsConnector),
        Arc::new(CpalCaptureDevice),
        Arc::new(CpalOutput::new(output_rate)),
        config.conversation_config(),
    );
    let observer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(event);
        }
    });

    // --- 5. Run until closed or interrupted ---
    let end = conversation
        .run(credential, shutdown_signal())
        .await
        .context("Failed to start the realtime session")?;
    drop(conversation);
    if let Err(e) = observer.await {
        warn!(error = %e, "Event logger task failed");
    }

    match end {
        ConversationEnd::Shutdown => info!("Conversation ended by user"),
        ConversationEnd::Closed(reason) => info!(?reason, "Conversation closed"),
        ConversationEnd::TransportError(e) => {
            return Err(anyhow::Error::new(e).context("Conversation ended by a transport failure"));
        }
    }
    Ok(())
}
