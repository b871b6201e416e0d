//! Wire types for the OpenAI Realtime WebSocket API.
//!
//! Only the events the voice pipeline reacts to are modelled; everything else
//! deserializes to [`ServerEvent::Other`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64 PCM16 audio.
        audio: String,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(rename = "session.created")]
    SessionCreated {},
    #[serde(rename = "session.updated")]
    SessionUpdated {},
    #[serde(rename = "response.created")]
    ResponseCreated {},
    #[serde(rename = "response.done")]
    ResponseDone {},
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio.done", alias = "response.output_audio.done")]
    ResponseAudioDone {},
    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta"
    )]
    ResponseAudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_events_serialize_with_type_tag() {
        let append = ClientEvent::InputAudioBufferAppend {
            audio: "AAAA".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&append).unwrap(),
            json!({"type": "input_audio_buffer.append", "audio": "AAAA"})
        );

        let update = ClientEvent::SessionUpdate {
            session: SessionConfig {
                instructions: Some("Be brief.".to_string()),
            },
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"type": "session.update", "session": {"instructions": "Be brief."}})
        );
    }

    #[test]
    fn test_unknown_event_is_other() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type": "rate_limits.updated", "rate_limits": []}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }

    #[test]
    fn test_output_audio_alias() {
        let json = r#"{"type": "response.output_audio.delta", "delta": "Zm9v"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::ResponseAudioDelta { ref delta } if delta == "Zm9v"));
    }
}
