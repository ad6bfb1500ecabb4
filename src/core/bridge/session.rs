//! Per-call record kept by the bridge actor.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::core::codec::CallAudioEncoding;

/// Lifecycle of a bridge. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BridgeState {
    /// Call leg accepted, AI leg being dialed
    Connecting,
    /// AI leg open, session configuration and buffered audio in flight
    Buffering,
    /// Audio flows directly in both directions
    Active,
    /// Teardown started; nothing more is sent on either leg
    Closing,
    /// Both legs closed, all tasks stopped
    Closed,
}

impl BridgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Buffering => "buffering",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    pub fn is_closing(&self) -> bool {
        *self >= Self::Closing
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a bridge started closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    CallLegClosed,
    CallLegError(String),
    /// The call leg sent `stop`
    CallStopped,
    AiLegClosed,
    AiLegError(String),
    AiDialFailed(String),
    MaxDurationElapsed,
    BufferOverflow,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallLegClosed => write!(f, "call leg closed"),
            Self::CallLegError(e) => write!(f, "call leg error: {e}"),
            Self::CallStopped => write!(f, "call stopped"),
            Self::AiLegClosed => write!(f, "AI leg closed"),
            Self::AiLegError(e) => write!(f, "AI leg error: {e}"),
            Self::AiDialFailed(e) => write!(f, "AI dial failed: {e}"),
            Self::MaxDurationElapsed => write!(f, "maximum call duration elapsed"),
            Self::BufferOverflow => write!(f, "readiness buffer overflow"),
        }
    }
}

/// Counters reported when a call ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Media frames received on the call leg
    pub frames_in: u64,
    /// Media frames sent to the call leg
    pub frames_out: u64,
    /// Frames lost to codec failures or buffer eviction
    pub dropped_frames: u64,
    /// Malformed or unrecognised frames on either leg
    pub malformed_frames: u64,
    pub commits_sent: u64,
    pub responses_completed: u64,
}

/// State of one call. Owned and mutated only by the bridge actor.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub id: Uuid,
    pub state: BridgeState,
    /// Stream identifier from the call leg's `start` frame
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
    pub call_encoding: CallAudioEncoding,
    /// Set once the first media frame is seen; the encoding is fixed from then on
    pub encoding_locked: bool,
    /// Flipped false -> true exactly once, when the AI leg opens
    pub ai_ready: bool,
    pub audio_since_commit: Duration,
    /// Audio deltas received since the last completed response
    pub response_audio_frames: u64,
    pub started_at: Instant,
    pub close_reason: Option<CloseReason>,
    pub stats: CallStats,
}

impl CallSession {
    pub fn new(id: Uuid, call_encoding: CallAudioEncoding) -> Self {
        Self {
            id,
            state: BridgeState::Connecting,
            stream_sid: None,
            call_sid: None,
            call_encoding,
            encoding_locked: false,
            ai_ready: false,
            audio_since_commit: Duration::ZERO,
            response_audio_frames: 0,
            started_at: Instant::now(),
            close_reason: None,
            stats: CallStats::default(),
        }
    }

    /// Move to `next` if it is ahead of the current state. Returns whether
    /// the state changed.
    pub fn advance(&mut self, next: BridgeState) -> bool {
        if next > self.state {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
