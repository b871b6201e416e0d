//! Wire types for the Gemini Live (BidiGenerateContent) WebSocket API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
}

/// Session setup. Constrained ephemeral tokens fix the model and generation
/// config server-side, so the client sends an empty object.
#[derive(Debug, Default, Serialize)]
pub struct BidiGenerateContentSetup {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    pub audio: Blob,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<LiveServerContent>,
    pub usage_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerContent {
    pub model_turn: Option<ServerContentTurn>,
    pub output_transcription: Option<ServerTranscription>,
    pub generation_complete: Option<bool>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ServerContentTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<ServerBlob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlob {
    #[serde(default)]
    pub data: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerTranscription {
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_setup_serializes_to_empty_object() {
        let setup = ClientMessage::Setup(BidiGenerateContentSetup::default());
        assert_eq!(serde_json::to_value(&setup).unwrap(), json!({"setup": {}}));
    }

    #[test]
    fn test_server_content_parses_inline_audio() {
        let message: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {"parts": [{
                    "inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "Zm9v"}
                }]}
            }
        }))
        .unwrap();
        let content = message.server_content.unwrap();
        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts[0].inline_data.as_ref().unwrap().data, "Zm9v");
        assert!(content.generation_complete.is_none());
    }
}
