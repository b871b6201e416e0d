//! The session connection state machine.
//!
//! `SessionConnection` owns the provider socket's outbound half and all
//! session state. The caller pumps the inbound half into
//! [`SessionConnection::handle_inbound`]; every state transition for one
//! inbound item completes before the resulting [`SessionEvent`]s are
//! published, so observers never see a transitional state.
//!
//! ```text
//! Disconnected --connect--> Connecting --transport open--> Connected
//!     Connected --setup acknowledged--> Connected + Ready
//!     any --close / error / disconnect--> Disconnected
//! ```

use crate::assembler::{ResponseAssembler, Utterance};
use crate::capture::CaptureFrame;
use crate::error::{ConnectionError, ProtocolParseError, TransportError};
use crate::gate::GateConditions;
use crate::protocol::{OutboundMessage, ProtocolEvent, RealtimeProtocol, UsageMetadata};
use crate::transport::{CloseInfo, Connector, InboundStream, OutboundSink, TransportFrame};
use futures::SinkExt;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    NotInitialized,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    InProgress,
}

/// State of one connection attempt. Reset wholesale on teardown.
#[derive(Debug, Default)]
pub struct Session {
    pub connection_state: ConnectionState,
    pub ready_state: ReadyState,
    pub turn_state: TurnState,
    credential: Option<SecretString>,
}

impl Session {
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `disconnect()` was called.
    Local,
    /// The remote end closed the socket, with its close frame if one was sent.
    Remote(Option<CloseInfo>),
}

/// Notifications published by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The provider acknowledged setup; audio may be streamed.
    Ready,
    TurnStarted,
    /// An audio chunk accepted into the current turn.
    AudioDelta(String),
    TranscriptDelta(String),
    /// The current turn ended; carries the whole turn's audio.
    UtteranceComplete(Utterance),
    Usage(UsageMetadata),
    /// The provider reported an error event.
    ProviderError(String),
    /// One inbound message could not be parsed and was dropped.
    ProtocolError(String),
    Closed(CloseReason),
    TransportError(TransportError),
}

pub struct SessionConnection {
    protocol: Arc<dyn RealtimeProtocol>,
    connector: Arc<dyn Connector>,
    session: Session,
    outbound: Option<OutboundSink>,
    assembler: ResponseAssembler,
    transcript: String,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionConnection {
    /// Creates a disconnected session and the receiver its events are published on.
    pub fn new(
        protocol: Arc<dyn RealtimeProtocol>,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let connection = Self {
            protocol,
            connector,
            session: Session::default(),
            outbound: None,
            assembler: ResponseAssembler::new(),
            transcript: String::new(),
            events,
        };
        (connection, events_rx)
    }

    pub fn protocol(&self) -> &Arc<dyn RealtimeProtocol> {
        &self.protocol
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state
    }

    pub fn ready_state(&self) -> ReadyState {
        self.session.ready_state
    }

    pub fn turn_state(&self) -> TurnState {
        self.session.turn_state
    }

    /// Transcript of the AI's speech in the current (or last) turn.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Connected and acknowledged by the provider.
    pub fn is_ready(&self) -> bool {
        self.session.connection_state == ConnectionState::Connected
            && self.session.ready_state == ReadyState::Ready
    }

    pub fn gate_conditions(&self, playback_active: bool) -> GateConditions {
        GateConditions {
            ready: self.session.ready_state,
            turn: self.session.turn_state,
            playback_active,
        }
    }

    /// Opens the transport and sends the provider's setup message.
    ///
    /// Returns the inbound half, which the caller must feed to
    /// [`handle_inbound`](Self::handle_inbound) in order.
    #[instrument(name = "session_connect", skip_all, fields(provider = self.protocol.name()))]
    pub async fn connect(
        &mut self,
        credential: SecretString,
    ) -> Result<InboundStream, ConnectionError> {
        if self.session.connection_state != ConnectionState::Disconnected {
            return Err(ConnectionError::AlreadyActive(self.session.connection_state));
        }

        let endpoint = self.protocol.endpoint(&credential)?;
        self.session = Session {
            connection_state: ConnectionState::Connecting,
            credential: Some(credential),
            ..Session::default()
        };
        info!(?endpoint, "Connecting to realtime provider");

        let (mut sink, inbound) = match self.connector.connect(endpoint).await {
            Ok(halves) => halves,
            Err(e) => {
                error!(error = %e, "Failed to connect to realtime provider");
                self.reset();
                return Err(e.into());
            }
        };
        self.session.connection_state = ConnectionState::Connected;

        let setup = match self.protocol.setup_message() {
            Ok(setup) => setup,
            Err(e) => {
                self.reset();
                return Err(e.into());
            }
        };
        if let Err(e) = sink.send(setup).await {
            error!(error = %e, "Failed to send session setup");
            self.reset();
            return Err(ConnectionError::Setup(e));
        }
        self.outbound = Some(sink);
        info!("Transport open; awaiting setup acknowledgement");
        Ok(inbound)
    }

    /// Sends a message to the provider. A no-op (returning `false`) unless the
    /// session is connected and ready.
    pub async fn send(&mut self, message: OutboundMessage) -> bool {
        if !self.is_ready() {
            trace!("Session not ready; dropping outbound message");
            return false;
        }
        let text = match self.protocol.encode(&message) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(
                    provider = self.protocol.name(),
                    "Provider has no wire form for message; skipping"
                );
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        let Some(sink) = self.outbound.as_mut() else {
            return false;
        };
        match sink.send(text).await {
            Ok(()) => true,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn send_audio(&mut self, frame: &CaptureFrame) -> bool {
        self.send(OutboundMessage::Audio(frame.to_base64())).await
    }

    pub async fn update_instructions(&mut self, instructions: impl Into<String>) -> bool {
        self.send(OutboundMessage::Instructions(instructions.into())).await
    }

    /// Closes the connection. Idempotent and safe from any state; always ends
    /// `Disconnected`.
    pub async fn disconnect(&mut self) {
        if self.session.connection_state == ConnectionState::Disconnected {
            debug!("Disconnect requested while already disconnected");
            return;
        }
        self.session.connection_state = ConnectionState::Closing;
        if let Some(mut sink) = self.outbound.take() {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Error while closing transport");
            }
        }
        self.reset();
        info!(provider = self.protocol.name(), "Session disconnected");
        self.publish([SessionEvent::Closed(CloseReason::Local)]);
    }

    /// Processes one item from the inbound stream (`None` = stream ended).
    pub fn handle_inbound(&mut self, item: Option<Result<TransportFrame, TransportError>>) {
        if self.session.connection_state == ConnectionState::Disconnected {
            trace!("Ignoring inbound item after teardown");
            return;
        }
        match item {
            Some(Ok(TransportFrame::Text(text))) => self.dispatch(&text),
            Some(Ok(TransportFrame::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => self.dispatch(&text),
                Err(_) => self.reject(ProtocolParseError::NotUtf8),
            },
            Some(Ok(TransportFrame::Close(info))) => self.closed_by_remote(info),
            Some(Err(e)) => self.fail(e),
            None => self.closed_by_remote(None),
        }
    }

    fn dispatch(&mut self, text: &str) {
        let events = match self.protocol.decode(text) {
            Ok(events) => events,
            Err(e) => return self.reject(e),
        };
        let mut effects = Vec::with_capacity(events.len());
        for event in events {
            self.apply(event, &mut effects);
        }
        self.publish(effects);
    }

    fn apply(&mut self, event: ProtocolEvent, effects: &mut Vec<SessionEvent>) {
        match event {
            ProtocolEvent::SetupAcknowledged => {
                if self.session.ready_state == ReadyState::NotInitialized {
                    self.session.ready_state = ReadyState::Ready;
                    info!("Session ready to receive audio");
                    effects.push(SessionEvent::Ready);
                } else {
                    debug!("Repeated setup acknowledgement");
                }
            }
            ProtocolEvent::TurnStarted => {
                if self.session.turn_state == TurnState::Idle {
                    self.session.turn_state = TurnState::InProgress;
                    self.transcript.clear();
                    self.assembler.open();
                    debug!("AI turn started");
                    effects.push(SessionEvent::TurnStarted);
                }
            }
            ProtocolEvent::AudioDelta(chunk) => {
                if self.session.turn_state == TurnState::InProgress {
                    self.assembler.append_chunk(chunk.clone());
                    effects.push(SessionEvent::AudioDelta(chunk));
                } else {
                    warn!("Audio delta received outside of a turn; discarding");
                }
            }
            ProtocolEvent::TranscriptDelta(delta) => {
                self.transcript.push_str(&delta);
                effects.push(SessionEvent::TranscriptDelta(delta));
            }
            ProtocolEvent::TurnEnded => {
                if self.session.turn_state == TurnState::InProgress {
                    self.session.turn_state = TurnState::Idle;
                    let utterance = self.assembler.flush_turn();
                    info!(
                        chunks = utterance.chunk_count,
                        encoded_len = utterance.audio.len(),
                        "AI turn complete"
                    );
                    effects.push(SessionEvent::UtteranceComplete(utterance));
                } else {
                    warn!("Turn end received while idle; ignoring");
                }
            }
            ProtocolEvent::Usage(usage) => effects.push(SessionEvent::Usage(usage)),
            ProtocolEvent::ServerError(message) => {
                warn!(%message, "Provider reported an error");
                effects.push(SessionEvent::ProviderError(message));
            }
        }
    }

    fn reject(&mut self, error: ProtocolParseError) {
        warn!(error = %error, "Dropping unparseable message");
        self.publish([SessionEvent::ProtocolError(error.to_string())]);
    }

    fn closed_by_remote(&mut self, info: Option<CloseInfo>) {
        info!(?info, "Connection closed by remote");
        self.reset();
        self.publish([SessionEvent::Closed(CloseReason::Remote(info))]);
    }

    fn fail(&mut self, error: TransportError) {
        error!(error = %error, "Transport failure; tearing down session");
        self.reset();
        self.publish([SessionEvent::TransportError(error)]);
    }

    fn reset(&mut self) {
        self.session = Session::default();
        self.outbound = None;
        self.assembler.reset();
        self.transcript.clear();
    }

    fn publish(&self, effects: impl IntoIterator<Item = SessionEvent>) {
        for event in effects {
            // A dropped receiver just means nobody is listening.
            let _ = self.events.send(event);
        }
    }
}
