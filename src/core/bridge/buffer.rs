//! Holds AI-bound frames produced before the AI leg is ready.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::leg::{LegError, LegSink};

/// What to do when the buffer is full and another frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest frame to make room
    #[default]
    DropOldest,
    /// Refuse the frame; the bridge hangs up the call
    Disconnect,
}

impl OverflowPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drop_oldest" => Some(Self::DropOldest),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// Result of [`ReadinessBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    /// Buffered after evicting the oldest frame
    DroppedOldest,
    /// Full under [`OverflowPolicy::Disconnect`]; the frame was not kept
    Overflow,
    /// The buffer was already drained; the caller should send directly
    AlreadyDrained,
}

/// FIFO of serialized AI-leg frames, drained exactly once at readiness.
#[derive(Debug)]
pub struct ReadinessBuffer {
    frames: VecDeque<String>,
    capacity: usize,
    overflow: OverflowPolicy,
    drained: bool,
    dropped: u64,
}

impl ReadinessBuffer {
    /// `capacity` is clamped to at least one frame.
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity.min(256)),
            capacity,
            overflow,
            drained: false,
            dropped: 0,
        }
    }

    pub fn push(&mut self, frame: String) -> PushOutcome {
        if self.drained {
            return PushOutcome::AlreadyDrained;
        }

        if self.frames.len() < self.capacity {
            self.frames.push_back(frame);
            return PushOutcome::Buffered;
        }

        match self.overflow {
            OverflowPolicy::DropOldest => {
                self.frames.pop_front();
                self.frames.push_back(frame);
                self.dropped += 1;
                PushOutcome::DroppedOldest
            }
            OverflowPolicy::Disconnect => PushOutcome::Overflow,
        }
    }

    /// Send every buffered frame over `target` in arrival order and mark the
    /// buffer ready. A second call sends nothing.
    ///
    /// On a send failure the buffer is still marked ready and emptied; the
    /// leg is dead and the bridge is about to close.
    pub async fn drain_to(&mut self, target: &mut dyn LegSink) -> Result<usize, LegError> {
        if self.drained {
            return Ok(0);
        }
        self.drained = true;

        let mut sent = 0;
        while let Some(frame) = self.frames.pop_front() {
            if let Err(e) = target.send_text(frame).await {
                self.frames.clear();
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    pub fn is_ready(&self) -> bool {
        self.drained
    }

    /// Drop buffered frames without sending them.
    pub fn discard(&mut self) -> usize {
        let discarded = self.frames.len();
        self.frames.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames evicted under [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
