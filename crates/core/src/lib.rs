//! Provider-agnostic core of a realtime voice conversation client.
//!
//! Audio flows `capture -> gate -> session -> wire` upstream and
//! `wire -> session -> assembler -> codec -> playback` downstream. Provider
//! dialects plug in through [`protocol::RealtimeProtocol`], sockets through
//! [`transport::Connector`], and audio hardware through
//! [`capture::CaptureDevice`] and [`playback::AudioOutput`].

pub mod assembler;
pub mod capture;
pub mod codec;
pub mod conversation;
pub mod error;
pub mod gate;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use assembler::{ResponseAssembler, Utterance};
pub use conversation::{
    Conversation, ConversationConfig, ConversationEnd, ConversationEvent, PlaybackMode,
};
pub use error::{
    CaptureError, ConnectionError, DecodeError, PlaybackError, ProtocolError, ProtocolParseError,
    TransportError,
};
pub use protocol::{
    AudioFormat, Endpoint, OutboundMessage, ProtocolEvent, RealtimeProtocol, UsageMetadata,
};
pub use session::{
    CloseReason, ConnectionState, ReadyState, SessionConnection, SessionEvent, TurnState,
};
