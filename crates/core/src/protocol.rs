//! The provider-agnostic dispatch contract.
//!
//! Each realtime provider speaks its own JSON dialect over the socket. An
//! adapter implementing [`RealtimeProtocol`] translates that dialect to and from
//! the small vocabulary below, so the rest of the pipeline never looks at wire
//! types.

use crate::error::{ProtocolError, ProtocolParseError};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Opaque usage counters reported by the provider, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageMetadata(pub serde_json::Value);

/// A classified inbound message. One wire message may yield several.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// The provider accepted the session setup; audio may now be sent.
    SetupAcknowledged,
    /// The AI started a response turn.
    TurnStarted,
    /// One base64 PCM16 chunk of synthesized speech for the current turn.
    AudioDelta(String),
    /// Incremental transcript of the AI's speech.
    TranscriptDelta(String),
    /// The AI finished generating the current turn.
    TurnEnded,
    Usage(UsageMetadata),
    /// The provider reported an error about a request. Not fatal.
    ServerError(String),
}

/// Messages the pipeline may send once the session is ready.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// A base64 PCM16 chunk of captured microphone audio.
    Audio(String),
    /// Replacement system instructions for the conversation.
    Instructions(String),
}

/// PCM16 mono sample rates used in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
}

/// Where and how to open the provider socket.
///
/// The URL carries the ephemeral credential, so `Debug` only prints the
/// scheme, host and path.
#[derive(Clone)]
pub struct Endpoint {
    pub url: Url,
    pub subprotocols: Vec<String>,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            subprotocols: Vec::new(),
        }
    }

    pub fn with_subprotocols(mut self, subprotocols: Vec<String>) -> Self {
        self.subprotocols = subprotocols;
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("scheme", &self.url.scheme())
            .field("host", &self.url.host_str())
            .field("path", &self.url.path())
            .field("subprotocols", &self.subprotocols.len())
            .finish()
    }
}

/// A realtime provider's wire dialect.
pub trait RealtimeProtocol: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn audio_format(&self) -> AudioFormat;

    /// Builds the socket endpoint authenticated with `credential`.
    fn endpoint(&self, credential: &SecretString) -> Result<Endpoint, ProtocolError>;

    /// The message sent right after the transport opens.
    fn setup_message(&self) -> Result<String, ProtocolError>;

    /// Serializes an outbound message. `Ok(None)` means the provider has no
    /// wire form for it.
    fn encode(&self, message: &OutboundMessage) -> Result<Option<String>, ProtocolError>;

    /// Classifies one inbound text message.
    fn decode(&self, text: &str) -> Result<Vec<ProtocolEvent>, ProtocolParseError>;
}
