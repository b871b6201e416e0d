//! Half-duplex transmit policy.
//!
//! Captured frames may only go upstream while the session is ready, the AI is
//! not mid-turn and nothing is playing. Everything else is dropped on the
//! floor: this is a suppressor, not a queue.

use crate::session::{ReadyState, TurnState};
use std::time::Duration;
use tokio::time::Instant;

/// Inputs to one gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConditions {
    pub ready: ReadyState,
    pub turn: TurnState,
    pub playback_active: bool,
}

/// True iff a frame captured under `conditions` may be transmitted.
pub fn admits(conditions: GateConditions) -> bool {
    conditions.ready == ReadyState::Ready
        && conditions.turn == TurnState::Idle
        && !conditions.playback_active
}

/// Stateful wrapper around [`admits`] that also enforces an optional cooldown
/// after playback drains, so the speaker's tail is not picked up by the mic.
#[derive(Debug, Default)]
pub struct TransmitGate {
    cooldown: Duration,
    quiet_until: Option<Instant>,
    forwarded: u64,
    dropped: u64,
}

impl TransmitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            ..Self::default()
        }
    }

    /// Records that playback just drained at `now`.
    pub fn note_playback_drained(&mut self, now: Instant) {
        if !self.cooldown.is_zero() {
            self.quiet_until = Some(now + self.cooldown);
        }
    }

    /// Decides whether a frame captured at `now` may be forwarded.
    pub fn check(&mut self, conditions: GateConditions, now: Instant) -> bool {
        let cooling = self.quiet_until.is_some_and(|until| now < until);
        let open = admits(conditions) && !cooling;
        if open {
            self.forwarded += 1;
        } else {
            self.dropped += 1;
            tracing::trace!(?conditions, cooling, "Transmit gate dropped frame");
        }
        open
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
