//! Byte-exact transcoding between base64 text and PCM16 little-endian audio.
//!
//! Nothing here resamples or checks frame alignment: every segment within a
//! session is assumed to share one mono PCM16 format.

use crate::error::DecodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes standard (padded) base64 into raw bytes.
pub fn decode(base64_fragment: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(base64_fragment)?)
}

/// Encodes raw bytes as standard (padded) base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Concatenates base64 segments into one encoded buffer, in list order.
///
/// Empty segments contribute nothing. A segment that fails to decode is
/// logged and treated as zero-length so a single corrupt chunk cannot abort a
/// whole turn; use [`try_combine`] for the strict variant.
pub fn combine<S: AsRef<str>>(segments: &[S]) -> String {
    let mut combined = Vec::with_capacity(estimated_len(segments));
    for (index, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if segment.is_empty() {
            continue;
        }
        match decode(segment) {
            Ok(bytes) => combined.extend_from_slice(&bytes),
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping undecodable audio segment");
            }
        }
    }
    encode(&combined)
}

/// Like [`combine`], but fails on the first undecodable segment.
pub fn try_combine<S: AsRef<str>>(segments: &[S]) -> Result<String, DecodeError> {
    let mut combined = Vec::with_capacity(estimated_len(segments));
    for segment in segments {
        let segment = segment.as_ref();
        if !segment.is_empty() {
            combined.extend_from_slice(&decode(segment)?);
        }
    }
    Ok(encode(&combined))
}

fn estimated_len<S: AsRef<str>>(segments: &[S]) -> usize {
    segments.iter().map(|s| s.as_ref().len() / 4 * 3).sum()
}

/// Interprets little-endian byte pairs as i16 samples. A trailing odd byte is ignored.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

pub fn pcm16_to_le_bytes(pcm16: &[i16]) -> Vec<u8> {
    pcm16.iter().flat_map(|&sample| sample.to_le_bytes()).collect()
}

pub fn encode_i16(pcm16: &[i16]) -> String {
    encode(&pcm16_to_le_bytes(pcm16))
}

pub fn decode_i16(base64_fragment: &str) -> Result<Vec<i16>, DecodeError> {
    Ok(pcm16_from_le_bytes(&decode(base64_fragment)?))
}

/// Scales a device sample in `[-1.0, 1.0]` to PCM16, saturating outside that range.
pub fn sample_f32_to_i16(sample: f32) -> i16 {
    (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Maps PCM16 onto `[-1.0, 1.0)` for the render device.
pub fn sample_i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}
