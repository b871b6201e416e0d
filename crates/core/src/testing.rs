//! Fixtures shared by the crate's unit tests.

use crate::error::{ProtocolError, ProtocolParseError};
use crate::protocol::{
    AudioFormat, Endpoint, OutboundMessage, ProtocolEvent, RealtimeProtocol, UsageMetadata,
};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Messages are JSON arrays of tokens: `["start", "delta:Zm9v", "end"]`.
pub struct TokenProtocol;

impl RealtimeProtocol for TokenProtocol {
    fn name(&self) -> &'static str {
        "token"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
        }
    }

    fn endpoint(&self, credential: &SecretString) -> Result<Endpoint, ProtocolError> {
        let url = Url::parse_with_params(
            "wss://realtime.test/socket",
            &[("token", credential.expose_secret())],
        )?;
        Ok(Endpoint::new(url))
    }

    fn setup_message(&self) -> Result<String, ProtocolError> {
        Ok("setup".to_string())
    }

    fn encode(&self, message: &OutboundMessage) -> Result<Option<String>, ProtocolError> {
        Ok(match message {
            OutboundMessage::Audio(audio) => Some(format!("audio:{audio}")),
            OutboundMessage::Instructions(_) => None,
        })
    }

    fn decode(&self, text: &str) -> Result<Vec<ProtocolEvent>, ProtocolParseError> {
        let tokens: Vec<String> = serde_json::from_str(text)?;
        Ok(tokens
            .iter()
            .filter_map(|token| {
                let (kind, arg) = token.split_once(':').unwrap_or((token.as_str(), ""));
                Some(match kind {
                    "ready" => ProtocolEvent::SetupAcknowledged,
                    "start" => ProtocolEvent::TurnStarted,
                    "delta" => ProtocolEvent::AudioDelta(arg.to_string()),
                    "text" => ProtocolEvent::TranscriptDelta(arg.to_string()),
                    "end" => ProtocolEvent::TurnEnded,
                    "usage" => ProtocolEvent::Usage(UsageMetadata(serde_json::json!({"total": 1}))),
                    "error" => ProtocolEvent::ServerError(arg.to_string()),
                    _ => return None,
                })
            })
            .collect())
    }
}

pub fn credential() -> SecretString {
    SecretString::from("ephemeral-key".to_string())
}
