//! Wires one session, the capture streamer, the playback queue and the
//! transmit gate into a running conversation.
//!
//! Everything runs on a single task: `run` multiplexes session events,
//! inbound frames, playback reports and capture ticks with `tokio::select!`,
//! handling each to completion before looking at the next.

use crate::capture::{CaptureConfig, CaptureDevice, CaptureFrame, CaptureStreamer};
use crate::codec;
use crate::error::{CaptureError, ConnectionError, PlaybackError, TransportError};
use crate::gate::TransmitGate;
use crate::playback::{AudioOutput, BufferId, PlaybackQueue, QueueSignal};
use crate::protocol::RealtimeProtocol;
use crate::session::{CloseReason, SessionConnection, SessionEvent};
use crate::transport::Connector;
use futures::StreamExt;
use futures::stream::FusedStream;
use secrecy::SecretString;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// When received audio is handed to the playback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Play each turn once it is complete.
    #[default]
    Utterance,
    /// Play each delta as it arrives, continuing gaplessly.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationConfig {
    pub capture_interval: Duration,
    pub playback_mode: PlaybackMode,
    /// Extra time the gate stays closed after playback drains.
    pub playback_cooldown: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(250),
            playback_mode: PlaybackMode::Utterance,
            playback_cooldown: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    Session(SessionEvent),
    PlaybackDrained,
    CaptureFailed(CaptureError),
    PlaybackFailed(PlaybackError),
}

/// Why `run` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEnd {
    Shutdown,
    Closed(CloseReason),
    TransportError(TransportError),
}

pub struct Conversation {
    session: SessionConnection,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    capture: CaptureStreamer,
    playback: PlaybackQueue,
    gate: TransmitGate,
    mode: PlaybackMode,
    observers: mpsc::UnboundedSender<ConversationEvent>,
}

impl Conversation {
    pub fn new(
        protocol: Arc<dyn RealtimeProtocol>,
        connector: Arc<dyn Connector>,
        capture_device: Arc<dyn CaptureDevice>,
        audio_output: Arc<dyn AudioOutput>,
        config: ConversationConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let capture_config = CaptureConfig {
            sample_rate: protocol.audio_format().input_sample_rate,
            interval: config.capture_interval,
        };
        let (session, session_events) = SessionConnection::new(protocol, connector);
        let (observers, observer_rx) = mpsc::unbounded_channel();
        let conversation = Self {
            session,
            session_events,
            capture: CaptureStreamer::new(capture_device, capture_config),
            playback: PlaybackQueue::new(audio_output),
            gate: TransmitGate::with_cooldown(config.playback_cooldown),
            mode: config.playback_mode,
            observers,
        };
        (conversation, observer_rx)
    }

    pub fn session(&self) -> &SessionConnection {
        &self.session
    }

    pub fn gate(&self) -> &TransmitGate {
        &self.gate
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }

    /// Connects and runs the conversation until the session closes or
    /// `shutdown` resolves. Capture and playback are always released on return.
    pub async fn run<F>(
        &mut self,
        credential: SecretString,
        shutdown: F,
    ) -> Result<ConversationEnd, ConnectionError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let inbound = tokio::select! {
            biased;
            _ = &mut shutdown => {
                self.teardown().await;
                return Ok(ConversationEnd::Shutdown);
            }
            result = self.session.connect(credential) => result,
        };
        let mut inbound = match inbound {
            Ok(inbound) => inbound.fuse(),
            Err(e) => {
                self.teardown().await;
                return Err(e);
            }
        };

        let end = loop {
            let end = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested; ending conversation");
                    Some(ConversationEnd::Shutdown)
                }
                Some(event) = self.session_events.recv() => self.on_session_event(event).await,
                item = inbound.next(), if !inbound.is_terminated() => {
                    self.session.handle_inbound(item);
                    None
                }
                Some(id) = self.playback.next_ended() => {
                    self.on_playback_ended(id);
                    None
                }
                frame = self.capture.next_frame() => {
                    self.on_frame(frame).await;
                    None
                }
            };
            if let Some(end) = end {
                break end;
            }
        };

        self.teardown().await;
        info!(?end, "Conversation ended");
        Ok(end)
    }

    async fn on_session_event(&mut self, event: SessionEvent) -> Option<ConversationEnd> {
        self.notify(ConversationEvent::Session(event.clone()));
        match &event {
            SessionEvent::Ready => {
                self.start_capture().await;
                None
            }
            SessionEvent::AudioDelta(chunk) if self.mode == PlaybackMode::Streaming => {
                self.play(chunk);
                None
            }
            SessionEvent::UtteranceComplete(utterance) if self.mode == PlaybackMode::Utterance => {
                self.play(&utterance.audio);
                None
            }
            SessionEvent::Closed(reason) => Some(ConversationEnd::Closed(reason.clone())),
            SessionEvent::TransportError(error) => {
                Some(ConversationEnd::TransportError(error.clone()))
            }
            _ => None,
        }
    }

    async fn start_capture(&mut self) {
        if let Err(e) = self.capture.start().await {
            warn!(error = %e, "Could not start audio capture");
            self.notify(ConversationEvent::CaptureFailed(e));
        }
    }

    fn play(&mut self, audio: &str) {
        if audio.is_empty() {
            debug!("Skipping empty audio");
            return;
        }
        let samples = match codec::decode_i16(audio) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable audio");
                return;
            }
        };

        let result = match self.playback.enqueue(samples) {
            Ok(_) => self.playback.start(),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "Playback failed; clearing queue");
            self.playback.stop();
            self.notify(ConversationEvent::PlaybackFailed(e));
        }
    }

    fn on_playback_ended(&mut self, id: BufferId) {
        if let Some(QueueSignal::Drained) = self.playback.on_ended(id) {
            self.gate.note_playback_drained(Instant::now());
            self.notify(ConversationEvent::PlaybackDrained);
        }
    }

    async fn on_frame(&mut self, frame: CaptureFrame) {
        let conditions = self.session.gate_conditions(self.playback.is_playing());
        if self.gate.check(conditions, Instant::now()) {
            self.session.send_audio(&frame).await;
        }
    }

    async fn teardown(&mut self) {
        self.capture.stop();
        self.playback.stop();
        self.session.disconnect().await;
        // Forward whatever the teardown itself published.
        while let Ok(event) = self.session_events.try_recv() {
            self.notify(ConversationEvent::Session(event));
        }
    }

    fn notify(&self, event: ConversationEvent) {
        let _ = self.observers.send(event);
    }
}
