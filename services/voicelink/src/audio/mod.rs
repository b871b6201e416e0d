//! cpal-backed capture and render devices.

pub mod capture;
pub mod playback;

pub use capture::CpalCaptureDevice;
pub use playback::CpalOutput;

use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};

/// Picks an f32 stream config that supports `sample_rate`, preferring mono and
/// otherwise the fewest channels.
pub(crate) fn choose_config(
    ranges: &[SupportedStreamConfigRange],
    sample_rate: u32,
) -> Option<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let fits = |c: &&SupportedStreamConfigRange| {
        c.sample_format() == SampleFormat::F32
            && c.min_sample_rate() <= rate
            && c.max_sample_rate() >= rate
    };

    ranges
        .iter()
        .filter(fits)
        .min_by_key(|c| c.channels())
        .map(|c| c.clone().with_sample_rate(rate).config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_prefers_mono() {
        let ranges = [
            range(2, 8_000, 48_000, SampleFormat::F32),
            range(1, 8_000, 48_000, SampleFormat::F32),
        ];
        let config = choose_config(&ranges, 24_000).unwrap();
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, SampleRate(24_000));
    }

    #[test]
    fn test_falls_back_to_stereo() {
        let ranges = [
            range(1, 44_100, 48_000, SampleFormat::F32),
            range(2, 8_000, 48_000, SampleFormat::F32),
        ];
        assert_eq!(choose_config(&ranges, 16_000).unwrap().channels, 2);
    }

    #[test]
    fn test_rejects_unsupported_rate_or_format() {
        let ranges = [
            range(1, 44_100, 48_000, SampleFormat::F32),
            range(1, 8_000, 48_000, SampleFormat::I16),
        ];
        assert!(choose_config(&ranges, 16_000).is_none());
    }
}
