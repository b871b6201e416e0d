//! Microphone capture, chunked into fixed-duration frames.
//!
//! The streamer holds the capture source only while streaming. Frames are
//! produced on an interval cadence by pulling samples from the source, so the
//! whole pipeline stays on one cooperative task.

use crate::codec;
use crate::error::CaptureError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    /// Duration of audio carried by one frame.
    pub interval: Duration,
}

impl CaptureConfig {
    /// Samples per frame (mono).
    pub fn frame_len(&self) -> usize {
        (u128::from(self.sample_rate) * self.interval.as_micros() / 1_000_000) as usize
    }
}

/// One fixed-duration window of captured PCM16 samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    /// Position in capture order, starting at 0 for each streaming run.
    pub sequence: u64,
    pub samples: Vec<i16>,
}

impl CaptureFrame {
    pub fn to_base64(&self) -> String {
        codec::encode_i16(&self.samples)
    }
}

/// The hardware capture collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Asks the platform for recording permission.
    async fn request_permission(&self) -> bool;

    /// Acquires the capture device. Only one source may be open at a time.
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

/// A live capture stream. Dropping it releases the device.
pub trait CaptureSource {
    /// Moves up to `out.len()` captured samples into `out`, returning how many
    /// were written.
    fn read(&mut self, out: &mut [i16]) -> usize;
}

struct ActiveCapture {
    source: Box<dyn CaptureSource>,
    ticker: Interval,
    pending: Vec<i16>,
    next_sequence: u64,
}

pub struct CaptureStreamer {
    device: Arc<dyn CaptureDevice>,
    config: CaptureConfig,
    active: Option<ActiveCapture>,
}

impl CaptureStreamer {
    pub fn new(device: Arc<dyn CaptureDevice>, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            active: None,
        }
    }

    pub fn config(&self) -> CaptureConfig {
        self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Requests permission and opens the device. Already streaming is a no-op.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Ok(());
        }
        if self.config.frame_len() == 0 {
            return Err(CaptureError::InvalidInterval(self.config.interval));
        }
        if !self.device.request_permission().await {
            tracing::warn!("Recording permission denied; capture not started");
            return Err(CaptureError::PermissionDenied);
        }

        let source = self.device.open(&self.config)?;
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.active = Some(ActiveCapture {
            source,
            ticker,
            pending: Vec::with_capacity(self.config.frame_len()),
            next_sequence: 0,
        });
        tracing::info!(
            sample_rate = self.config.sample_rate,
            interval_ms = period.as_millis() as u64,
            "Audio capture started"
        );
        Ok(())
    }

    /// Releases the capture device. Safe to call at any time, any number of times.
    pub fn stop(&mut self) -> bool {
        let stopped = self.active.take().is_some();
        if stopped {
            tracing::info!("Audio capture stopped");
        }
        stopped
    }

    /// Waits for the next complete frame. Never resolves while not streaming.
    ///
    /// Cancel-safe: samples already pulled from the source stay buffered.
    pub async fn next_frame(&mut self) -> CaptureFrame {
        let frame_len = self.config.frame_len();
        loop {
            let Some(active) = self.active.as_mut() else {
                return std::future::pending().await;
            };
            active.ticker.tick().await;

            let filled = active.pending.len();
            active.pending.resize(frame_len, 0);
            let read = active.source.read(&mut active.pending[filled..]);
            active.pending.truncate(filled + read);

            if active.pending.len() == frame_len {
                let sequence = active.next_sequence;
                active.next_sequence += 1;
                let samples = std::mem::replace(&mut active.pending, Vec::with_capacity(frame_len));
                return CaptureFrame { sequence, samples };
            }
            tracing::trace!(buffered = active.pending.len(), frame_len, "Partial capture frame");
        }
    }
}

impl Drop for CaptureStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}
