//! Gapless rendering of queued PCM16 buffers to the default output device.

use super::choose_config;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use voicelink_core::PlaybackError;
use voicelink_core::codec;
use voicelink_core::playback::{AudioOutput, AudioSink, BufferId};

#[derive(Debug, Clone, Copy)]
pub struct CpalOutput {
    sample_rate: u32,
}

impl CpalOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioOutput for CpalOutput {
    fn open(&self, ended: UnboundedSender<BufferId>) -> Result<Box<dyn AudioSink>, PlaybackError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("no output device available".to_string()))?;

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .collect();
        let config = choose_config(&ranges, self.sample_rate)
            .ok_or_else(|| PlaybackError::Device("no suitable output config found".to_string()))?;
        let channels = usize::from(config.channels);

        let renderer = Arc::new(Mutex::new(Renderer::new(ended)));
        let callback_renderer = Arc::clone(&renderer);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    match callback_renderer.lock() {
                        Ok(mut renderer) => renderer.render(data, channels),
                        Err(_) => data.fill(0.0),
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        stream.play().map_err(|e| PlaybackError::Device(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels,
            "audio playback opened"
        );
        Ok(Box::new(CpalSink {
            _stream: stream,
            renderer,
        }))
    }
}

struct CpalSink {
    _stream: cpal::Stream,
    renderer: Arc<Mutex<Renderer>>,
}

impl AudioSink for CpalSink {
    fn schedule(&mut self, id: BufferId, samples: Arc<[i16]>) -> Result<(), PlaybackError> {
        self.renderer
            .lock()
            .map_err(|_| PlaybackError::Device("renderer lock poisoned".to_string()))?
            .queue
            .push_back((id, samples));
        Ok(())
    }
}

/// Runs on the audio callback thread. Plays buffers back to back and reports
/// each one on `ended` as soon as its last sample is written.
struct Renderer {
    queue: VecDeque<(BufferId, Arc<[i16]>)>,
    position: usize,
    ended: UnboundedSender<BufferId>,
}

impl Renderer {
    fn new(ended: UnboundedSender<BufferId>) -> Self {
        Self {
            queue: VecDeque::new(),
            position: 0,
            ended,
        }
    }

    /// Fills an interleaved output buffer, duplicating the mono signal across
    /// channels. Silence once the queue runs dry.
    fn render(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let sample = self.next_sample().map_or(0.0, codec::sample_i16_to_f32);
            frame.fill(sample);
        }
    }

    fn next_sample(&mut self) -> Option<i16> {
        loop {
            let (id, samples) = self.queue.front()?;
            let id = *id;
            let Some(&sample) = samples.get(self.position) else {
                self.finish(id);
                continue;
            };
            self.position += 1;
            if self.position == samples.len() {
                self.finish(id);
            }
            return Some(sample);
        }
    }

    fn finish(&mut self, id: BufferId) {
        self.queue.pop_front();
        self.position = 0;
        // The queue may already be gone during teardown.
        let _ = self.ended.send(id);
    }
}
