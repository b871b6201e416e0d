//! Reassembles one complete AI utterance from the ordered audio deltas of a turn.

use crate::codec;
use crate::error::DecodeError;

/// The combined audio of one finished turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Utterance {
    /// Base64 PCM16, the byte-exact concatenation of every accepted chunk.
    pub audio: String,
    pub chunk_count: usize,
}

impl Utterance {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }

    /// Raw PCM16 little-endian bytes.
    pub fn pcm_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        codec::decode(&self.audio)
    }
}

/// Holds the response buffer of the current turn. At most one buffer is open
/// at a time and it never spans two turns.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buffer: Option<Vec<String>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh buffer for a new turn. Any chunks left in a buffer that
    /// was never flushed are discarded.
    pub fn open(&mut self) {
        if let Some(stale) = self.buffer.replace(Vec::new()) {
            if !stale.is_empty() {
                tracing::warn!(chunks = stale.len(), "Discarding unflushed response buffer");
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.buffer.is_some()
    }

    /// Number of chunks buffered for the current turn.
    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffers one chunk. Returns `false` (and drops the chunk) when no turn
    /// is open.
    pub fn append_chunk(&mut self, chunk: String) -> bool {
        match self.buffer.as_mut() {
            Some(buffer) => {
                buffer.push(chunk);
                true
            }
            None => {
                tracing::warn!("Audio delta received outside of a turn; discarding");
                false
            }
        }
    }

    /// Combines the buffered chunks in arrival order and closes the buffer.
    /// An empty or unopened buffer yields an empty utterance.
    pub fn flush_turn(&mut self) -> Utterance {
        let chunks = self.buffer.take().unwrap_or_default();
        Utterance {
            audio: codec::combine(&chunks),
            chunk_count: chunks.len(),
        }
    }

    /// Drops any open buffer without producing an utterance.
    pub fn reset(&mut self) {
        self.buffer = None;
    }
}
