//! Gemini Live adapter for the voicelink session core.

mod protocol;
pub mod types;

pub use protocol::{DEFAULT_BASE_URL, GeminiLive, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
