use crate::types::{
    BidiGenerateContentRealtimeInput, BidiGenerateContentSetup, Blob, ClientMessage, ServerMessage,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;
use voicelink_core::{
    AudioFormat, Endpoint, OutboundMessage, ProtocolError, ProtocolEvent, ProtocolParseError,
    RealtimeProtocol, UsageMetadata,
};

pub const DEFAULT_BASE_URL: &str = concat!(
    "wss://generativelanguage.googleapis.com/ws/",
    "google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContentConstrained"
);
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// The Gemini Live dialect over a constrained ephemeral token.
#[derive(Debug, Clone)]
pub struct GeminiLive {
    base_url: String,
}

impl GeminiLive {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for GeminiLive {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeProtocol for GeminiLive {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }

    fn endpoint(&self, credential: &SecretString) -> Result<Endpoint, ProtocolError> {
        let token = credential.expose_secret();
        let url = Url::parse_with_params(&self.base_url, &[("access_token", token)])?;
        Ok(Endpoint::new(url))
    }

    fn setup_message(&self) -> Result<String, ProtocolError> {
        let setup = ClientMessage::Setup(BidiGenerateContentSetup::default());
        Ok(serde_json::to_string(&setup)?)
    }

    fn encode(&self, message: &OutboundMessage) -> Result<Option<String>, ProtocolError> {
        match message {
            OutboundMessage::Audio(audio) => {
                let input = ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
                    audio: Blob {
                        mime_type: INPUT_MIME_TYPE.to_string(),
                        data: audio.clone(),
                    },
                });
                Ok(Some(serde_json::to_string(&input)?))
            }
            // Instructions are baked into the constrained token.
            OutboundMessage::Instructions(_) => Ok(None),
        }
    }

    fn decode(&self, text: &str) -> Result<Vec<ProtocolEvent>, ProtocolParseError> {
        let message: ServerMessage = serde_json::from_str(text)?;
        let mut events = Vec::new();

        if message.setup_complete.is_some() {
            events.push(ProtocolEvent::SetupAcknowledged);
        }

        if let Some(content) = message.server_content {
            let generation_complete = content.generation_complete == Some(true);
            if content.model_turn.is_some() || generation_complete {
                events.push(ProtocolEvent::TurnStarted);
            } else {
                trace!(
                    turn_complete = ?content.turn_complete,
                    interrupted = ?content.interrupted,
                    "Server content without model output"
                );
            }

            if let Some(transcription) = content.output_transcription {
                if !transcription.text.is_empty() {
                    events.push(ProtocolEvent::TranscriptDelta(transcription.text));
                }
            }

            let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
            for part in parts {
                match part.inline_data {
                    Some(blob) if !blob.data.is_empty() => {
                        events.push(ProtocolEvent::AudioDelta(blob.data))
                    }
                    _ => {
                        if let Some(text) = part.text {
                            debug!(len = text.len(), "Ignoring text part in audio session");
                        }
                    }
                }
            }

            if generation_complete {
                events.push(ProtocolEvent::TurnEnded);
            }
        }

        if let Some(usage) = message.usage_metadata {
            events.push(ProtocolEvent::Usage(UsageMetadata(usage)));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_endpoint_uses_access_token() {
        let endpoint = GeminiLive::new()
            .endpoint(&SecretString::from("auth_tokens/abc".to_string()))
            .unwrap();
        assert!(endpoint.url.as_str().starts_with(DEFAULT_BASE_URL));
        assert_eq!(
            endpoint.url.query_pairs().next().map(|(k, v)| (k.into_owned(), v.into_owned())),
            Some(("access_token".to_string(), "auth_tokens/abc".to_string()))
        );
        assert!(endpoint.subprotocols.is_empty());
    }

    #[test]
    fn test_setup_and_audio_encoding() {
        let p = GeminiLive::new();
        assert_eq!(p.setup_message().unwrap(), r#"{"setup":{}}"#);

        let audio = p.encode(&OutboundMessage::Audio("AAEC".to_string())).unwrap().unwrap();
        let value: Value = serde_json::from_str(&audio).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {"audio": {"mimeType": "audio/pcm;rate=16000", "data": "AAEC"}}
            })
        );
        assert_eq!(p.encode(&OutboundMessage::Instructions("x".to_string())).unwrap(), None);
    }

    #[test]
    fn test_decode_setup_complete() {
        assert_eq!(
            GeminiLive::new().decode(r#"{"setupComplete":{}}"#).unwrap(),
            vec![ProtocolEvent::SetupAcknowledged]
        );
    }

    #[test]
    fn test_decode_model_turn_chunks() {
        let events = GeminiLive::new()
            .decode(
                r#"{"serverContent":{"modelTurn":{"parts":[
                    {"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"Zm9v"}},
                    {"inlineData":{"data":""}},
                    {"inlineData":{"data":"YmFy"}}
                ]},"outputTranscription":{"text":"Hello"}}}"#,
            )
            .unwrap();
        assert_eq!(
            events,
            vec![
                ProtocolEvent::TurnStarted,
                ProtocolEvent::TranscriptDelta("Hello".to_string()),
                ProtocolEvent::AudioDelta("Zm9v".to_string()),
                ProtocolEvent::AudioDelta("YmFy".to_string()),
            ]
        );
    }

    #[test]
    fn test_generation_complete_with_empty_parts() {
        let events = GeminiLive::new()
            .decode(r#"{"serverContent":{"modelTurn":{"parts":[]},"generationComplete":true}}"#)
            .unwrap();
        assert_eq!(events, vec![ProtocolEvent::TurnStarted, ProtocolEvent::TurnEnded]);
    }

    #[test]
    fn test_turn_complete_alone_does_not_start_turn() {
        assert!(GeminiLive::new()
            .decode(r#"{"serverContent":{"turnComplete":true}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_usage_metadata() {
        let events = GeminiLive::new()
            .decode(r#"{"usageMetadata":{"totalTokenCount":9}}"#)
            .unwrap();
        assert_eq!(
            events,
            vec![ProtocolEvent::Usage(UsageMetadata(json!({"totalTokenCount": 9})))]
        );
    }

    #[test]
    fn test_non_object_is_parse_error() {
        assert!(GeminiLive::new().decode(r#""hello""#).is_err());
    }
}
