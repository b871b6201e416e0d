//! Ordered, gapless playback of decoded audio buffers.
//!
//! The queue owns the render sink while anything is playing. Buffers are
//! handed to the sink in enqueue order and the sink renders them back to back,
//! reporting each finished buffer's id on the ended channel. When the most
//! recently enqueued buffer ends, the queue releases the sink and signals
//! `Drained` exactly once.

use crate::error::PlaybackError;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one enqueued buffer. Unique for the lifetime of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Queued,
    Playing,
    Ended,
}

#[derive(Debug, Clone)]
pub struct PlaybackItem {
    pub id: BufferId,
    pub samples: Arc<[i16]>,
    pub state: ItemState,
}

/// Opens the hardware render sink.
#[cfg_attr(test, mockall::automock)]
pub trait AudioOutput: Send + Sync {
    /// Acquires the sink. Finished buffers must be reported on `ended`, in the
    /// order they were scheduled.
    fn open(
        &self,
        ended: mpsc::UnboundedSender<BufferId>,
    ) -> Result<Box<dyn AudioSink>, PlaybackError>;
}

/// A live render sink. Dropping it stops rendering and releases the device.
///
/// Not `Send`: some platform audio streams must stay on the thread that
/// created them.
pub trait AudioSink {
    /// Appends a buffer to render right after everything already scheduled.
    fn schedule(&mut self, id: BufferId, samples: Arc<[i16]>) -> Result<(), PlaybackError>;
}

/// What the queue reports back after handling a sink event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSignal {
    Drained,
}

pub struct PlaybackQueue {
    output: Arc<dyn AudioOutput>,
    sink: Option<Box<dyn AudioSink>>,
    items: VecDeque<PlaybackItem>,
    next_id: u64,
    last_enqueued: Option<BufferId>,
    ended_tx: mpsc::UnboundedSender<BufferId>,
    ended_rx: mpsc::UnboundedReceiver<BufferId>,
}

impl PlaybackQueue {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        Self {
            output,
            sink: None,
            items: VecDeque::new(),
            next_id: 1,
            last_enqueued: None,
            ended_tx,
            ended_rx,
        }
    }

    /// Adds a buffer behind everything already queued. While playing, the
    /// buffer is scheduled immediately so rendering continues without a gap.
    pub fn enqueue(&mut self, samples: impl Into<Arc<[i16]>>) -> Result<BufferId, PlaybackError> {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        let samples = samples.into();

        if let Some(sink) = self.sink.as_mut() {
            sink.schedule(id, samples.clone())?;
        }

        let state = if self.sink.is_some() && self.items.is_empty() {
            ItemState::Playing
        } else {
            ItemState::Queued
        };
        tracing::debug!(
            buffer_id = %id,
            samples = samples.len(),
            ?state,
            "Enqueued playback buffer"
        );
        self.items.push_back(PlaybackItem { id, samples, state });
        self.last_enqueued = Some(id);
        Ok(id)
    }

    /// Opens the sink and starts rendering queued buffers in order. A no-op if
    /// already playing or if nothing is queued.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.sink.is_some() {
            return Ok(());
        }
        if self.items.is_empty() {
            tracing::debug!("Playback start requested with an empty queue");
            return Ok(());
        }

        let mut sink = self.output.open(self.ended_tx.clone())?;
        for item in &self.items {
            if let Err(e) = sink.schedule(item.id, item.samples.clone()) {
                self.stop();
                return Err(e);
            }
        }
        self.sink = Some(sink);
        if let Some(front) = self.items.front_mut() {
            front.state = ItemState::Playing;
        }
        tracing::debug!(queued = self.items.len(), "Playback started");
        Ok(())
    }

    /// Hard stop: releases the sink and empties the queue. Idempotent.
    pub fn stop(&mut self) {
        let had_sink = self.sink.take().is_some();
        let dropped = self.items.len();
        self.items.clear();
        self.last_enqueued = None;
        if had_sink || dropped > 0 {
            tracing::debug!(dropped, "Playback stopped");
        }
    }

    /// True while the sink is held and rendering.
    pub fn is_playing(&self) -> bool {
        self.sink.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item currently rendering, if any.
    pub fn current(&self) -> Option<&PlaybackItem> {
        self.items.front().filter(|item| item.state == ItemState::Playing)
    }

    /// Waits for the sink to report a finished buffer. Never resolves while
    /// nothing is playing.
    pub async fn next_ended(&mut self) -> Option<BufferId> {
        self.ended_rx.recv().await
    }

    /// Applies a sink "ended" report. Ids that do not match the head of the
    /// queue (stale reports from a stopped sink) are ignored.
    pub fn on_ended(&mut self, id: BufferId) -> Option<QueueSignal> {
        match self.items.front() {
            Some(front) if front.id == id => {}
            _ => {
                tracing::debug!(buffer_id = %id, "Ignoring ended report for unknown buffer");
                return None;
            }
        }

        if let Some(mut finished) = self.items.pop_front() {
            finished.state = ItemState::Ended;
            tracing::trace!(buffer_id = %finished.id, "Playback buffer ended");
        }

        if self.last_enqueued == Some(id) {
            self.sink = None;
            self.items.clear();
            self.last_enqueued = None;
            tracing::debug!(buffer_id = %id, "Playback queue drained");
            return Some(QueueSignal::Drained);
        }

        if let Some(next) = self.items.front_mut() {
            next.state = ItemState::Playing;
        }
        None
    }
}
