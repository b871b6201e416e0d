//! Microphone capture from the default input device.

use super::choose_config;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{HeapCons, HeapRb, traits::*};
use voicelink_core::CaptureError;
use voicelink_core::capture::{CaptureConfig, CaptureDevice, CaptureSource};
use voicelink_core::codec;

/// Seconds of audio the callback may get ahead of the frame reader.
const BUFFER_SECONDS: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureDevice;

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    async fn request_permission(&self) -> bool {
        // Desktop hosts grant microphone access at the OS level; a missing
        // input device is the only refusal visible here.
        cpal::default_host().default_input_device().is_some()
    }

    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("no input device available".to_string()))?;

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .collect();
        let stream_config = choose_config(&ranges, config.sample_rate)
            .ok_or_else(|| CaptureError::Device("no suitable input config found".to_string()))?;
        let channels = usize::from(stream_config.channels).max(1);

        let (mut producer, consumer) =
            HeapRb::<i16>::new(config.sample_rate as usize * BUFFER_SECONDS).split();

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        let Some(&sample) = frame.first() else { continue };
                        if producer.try_push(codec::sample_f32_to_i16(sample)).is_err() {
                            break;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        stream.play().map_err(|e| CaptureError::Device(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels,
            "audio capture opened"
        );
        Ok(Box::new(CpalCaptureSource {
            _stream: stream,
            consumer,
        }))
    }
}

/// Dropping this stops the input stream.
struct CpalCaptureSource {
    _stream: cpal::Stream,
    consumer: HeapCons<i16>,
}

impl CaptureSource for CpalCaptureSource {
    fn read(&mut self, out: &mut [i16]) -> usize {
        self.consumer.pop_slice(out)
    }
}
