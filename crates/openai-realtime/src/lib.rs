//! OpenAI Realtime adapter for the voicelink session core.

mod protocol;
pub mod types;

pub use protocol::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiRealtime, SAMPLE_RATE};
