use crate::types::{ClientEvent, ServerEvent, SessionConfig};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;
use voicelink_core::{
    AudioFormat, Endpoint, OutboundMessage, ProtocolError, ProtocolEvent, ProtocolParseError,
    RealtimeProtocol, UsageMetadata,
};

pub const DEFAULT_BASE_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_MODEL: &str = "gpt-realtime";
/// OpenAI realtime PCM16 runs at 24 kHz in both directions.
pub const SAMPLE_RATE: u32 = 24_000;

/// The OpenAI Realtime dialect, authenticated with an ephemeral client secret.
#[derive(Debug, Clone)]
pub struct OpenAiRealtime {
    base_url: String,
    model: String,
    instructions: String,
}

impl OpenAiRealtime {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            instructions: instructions.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    fn session_update(instructions: &str) -> Result<String, ProtocolError> {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                instructions: Some(instructions.to_string()),
            },
        };
        Ok(serde_json::to_string(&event)?)
    }
}

impl RealtimeProtocol for OpenAiRealtime {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            input_sample_rate: SAMPLE_RATE,
            output_sample_rate: SAMPLE_RATE,
        }
    }

    fn endpoint(&self, credential: &SecretString) -> Result<Endpoint, ProtocolError> {
        let key = credential.expose_secret();
        let url = Url::parse_with_params(
            &self.base_url,
            &[("model", self.model.as_str()), ("token", key)],
        )?;
        Ok(Endpoint::new(url).with_subprotocols(vec![
            "realtime".to_string(),
            format!("openai-insecure-api-key.{key}"),
            "openai-beta.realtime-v1".to_string(),
        ]))
    }

    fn setup_message(&self) -> Result<String, ProtocolError> {
        Self::session_update(&self.instructions)
    }

    fn encode(&self, message: &OutboundMessage) -> Result<Option<String>, ProtocolError> {
        let text = match message {
            OutboundMessage::Audio(audio) => {
                let event = ClientEvent::InputAudioBufferAppend { audio: audio.clone() };
                serde_json::to_string(&event)?
            }
            OutboundMessage::Instructions(instructions) => Self::session_update(instructions)?,
        };
        Ok(Some(text))
    }

    fn decode(&self, text: &str) -> Result<Vec<ProtocolEvent>, ProtocolParseError> {
        let message: serde_json::Value = serde_json::from_str(text)?;
        // Usage may ride on any event that carries a response object.
        let usage = message
            .pointer("/response/usage")
            .filter(|usage| !usage.is_null())
            .cloned();
        let event: ServerEvent = serde_json::from_value(message)?;

        let mut events = Vec::new();
        match event {
            ServerEvent::Error { error } => events.push(ProtocolEvent::ServerError(error.message)),
            ServerEvent::SessionCreated {} => debug!("OpenAI session created"),
            ServerEvent::SessionUpdated {} => events.push(ProtocolEvent::SetupAcknowledged),
            ServerEvent::ResponseCreated {} => events.push(ProtocolEvent::TurnStarted),
            ServerEvent::ResponseDone {} => trace!("OpenAI response done"),
            ServerEvent::ResponseAudioDelta { delta } => {
                if !delta.is_empty() {
                    events.push(ProtocolEvent::AudioDelta(delta));
                }
            }
            ServerEvent::ResponseAudioDone {} => events.push(ProtocolEvent::TurnEnded),
            ServerEvent::ResponseAudioTranscriptDelta { delta } => {
                if !delta.is_empty() {
                    events.push(ProtocolEvent::TranscriptDelta(delta));
                }
            }
            ServerEvent::Other => trace!("Ignoring unhandled OpenAI event"),
        }
        if let Some(usage) = usage {
            events.push(ProtocolEvent::Usage(UsageMetadata(usage)));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn protocol() -> OpenAiRealtime {
        OpenAiRealtime::new("You are a helpful assistant.")
    }

    #[test]
    fn test_endpoint_carries_model_token_and_subprotocols() {
        let endpoint = protocol()
            .endpoint(&SecretString::from("ek_123".to_string()))
            .unwrap();
        assert_eq!(
            endpoint.url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-realtime&token=ek_123"
        );
        assert_eq!(
            endpoint.subprotocols,
            vec![
                "realtime",
                "openai-insecure-api-key.ek_123",
                "openai-beta.realtime-v1"
            ]
        );
    }

    #[test]
    fn test_setup_sends_instructions() {
        let setup: Value = serde_json::from_str(&protocol().setup_message().unwrap()).unwrap();
        assert_eq!(
            setup,
            json!({
                "type": "session.update",
                "session": {"instructions": "You are a helpful assistant."}
            })
        );
    }

    #[test]
    fn test_encode_audio_append() {
        let text = protocol()
            .encode(&OutboundMessage::Audio("AAEC".to_string()))
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "input_audio_buffer.append", "audio": "AAEC"}));
    }

    #[test]
    fn test_decode_turn_events() {
        let p = protocol();
        assert_eq!(
            p.decode(r#"{"type":"session.updated","session":{}}"#).unwrap(),
            vec![ProtocolEvent::SetupAcknowledged]
        );
        assert_eq!(
            p.decode(r#"{"type":"response.created","response":{"id":"resp_1"}}"#).unwrap(),
            vec![ProtocolEvent::TurnStarted]
        );
        assert_eq!(
            p.decode(r#"{"type":"response.audio.delta","delta":"Zm9v"}"#).unwrap(),
            vec![ProtocolEvent::AudioDelta("Zm9v".to_string())]
        );
        assert_eq!(
            p.decode(r#"{"type":"response.audio_transcript.delta","delta":"Hi"}"#).unwrap(),
            vec![ProtocolEvent::TranscriptDelta("Hi".to_string())]
        );
        assert_eq!(
            p.decode(r#"{"type":"response.audio.done"}"#).unwrap(),
            vec![ProtocolEvent::TurnEnded]
        );
    }

    #[test]
    fn test_empty_delta_is_ignored() {
        assert!(protocol()
            .decode(r#"{"type":"response.audio.delta","delta":""}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_usage_is_reported_from_response_done() {
        let events = protocol()
            .decode(r#"{"type":"response.done","response":{"usage":{"total_tokens":42}}}"#)
            .unwrap();
        assert_eq!(
            events,
            vec![ProtocolEvent::Usage(UsageMetadata(json!({"total_tokens": 42})))]
        );
    }

    #[test]
    fn test_usage_is_reported_from_any_event() {
        let p = protocol();
        assert_eq!(
            p.decode(r#"{"type":"response.audio.done","response":{"usage":{"total_tokens":7}}}"#)
                .unwrap(),
            vec![
                ProtocolEvent::TurnEnded,
                ProtocolEvent::Usage(UsageMetadata(json!({"total_tokens": 7})))
            ]
        );
        assert_eq!(
            p.decode(
                r#"{"type":"response.output_item.done","response":{"usage":{"total_tokens":3}}}"#
            )
            .unwrap(),
            vec![ProtocolEvent::Usage(UsageMetadata(json!({"total_tokens": 3})))]
        );
        assert_eq!(
            p.decode(r#"{"type":"response.created","response":{"usage":{"total_tokens":1}}}"#)
                .unwrap(),
            vec![
                ProtocolEvent::TurnStarted,
                ProtocolEvent::Usage(UsageMetadata(json!({"total_tokens": 1})))
            ]
        );
    }

    #[test]
    fn test_null_usage_is_ignored() {
        assert!(protocol()
            .decode(r#"{"type":"response.done","response":{"usage":null}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_error_event() {
        let json =
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad audio"}}"#;
        let events = protocol().decode(json).unwrap();
        assert_eq!(events, vec![ProtocolEvent::ServerError("bad audio".to_string())]);
    }

    #[test]
    fn test_malformed_messages_are_parse_errors() {
        let p = protocol();
        assert!(matches!(p.decode("not json"), Err(ProtocolParseError::Json(_))));
        assert!(matches!(p.decode(r#"{"delta":"Zm9v"}"#), Err(ProtocolParseError::Json(_))));
    }
}
