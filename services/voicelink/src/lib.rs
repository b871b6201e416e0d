//! Desktop runtime for realtime voice conversations: environment config,
//! ephemeral token retrieval, the WebSocket transport and cpal audio devices.

pub mod audio;
pub mod config;
pub mod token;
pub mod transport;

use config::{Config, Provider};
use gemini_realtime::GeminiLive;
use openai_realtime::OpenAiRealtime;
use std::sync::Arc;
use voicelink_core::RealtimeProtocol;

/// Builds the wire dialect for the configured provider.
pub fn build_protocol(config: &Config) -> Arc<dyn RealtimeProtocol> {
    match config.provider {
        Provider::OpenAI => Arc::new(
            OpenAiRealtime::new(config.instructions.clone())
                .with_model(config.openai_model.clone()),
        ),
        Provider::Gemini => Arc::new(GeminiLive::new()),
    }
}
