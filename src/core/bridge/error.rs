use thiserror::Error;

use super::leg::LegError;
use crate::core::codec::CodecError;

/// Errors raised while handling a single bridge event.
///
/// None of these escape the actor: frame-level errors drop the frame, leg
/// errors start teardown.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("leg error: {0}")]
    Leg(#[from] LegError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the error only costs the current frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_)
                | Self::InvalidPayload(_)
                | Self::Codec(_)
                | Self::Serialization(_)
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
