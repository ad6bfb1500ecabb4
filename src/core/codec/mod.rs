//! Audio conversion between the call leg and the AI leg.
//!
//! The call leg always runs at 8 kHz, either G.711 μ-law or 16-bit linear
//! PCM. The AI leg takes whatever [`OpenAIRealtimeAudioFormat`] the session
//! was configured with. [`AudioTransducer`] holds the pair and converts in both
//! directions; it is `Copy` and carries no state between frames.

pub mod g711;
pub mod pcm;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::realtime::openai::OpenAIRealtimeAudioFormat;

/// Sample rate of every call-leg encoding.
pub const CALL_SAMPLE_RATE: u32 = 8000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty audio payload")]
    Empty,
    #[error("PCM16 payload has odd length {0}")]
    OddLength(usize),
}

/// Audio encoding used on the call leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallAudioEncoding {
    /// G.711 μ-law, one byte per sample
    #[default]
    Mulaw,
    /// 16-bit signed little-endian linear PCM
    Pcm16,
}

impl CallAudioEncoding {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mulaw => "mulaw",
            Self::Pcm16 => "pcm16",
        }
    }

    /// Bytes of payload per millisecond of audio at 8 kHz.
    #[inline]
    pub fn bytes_per_ms(&self) -> usize {
        match self {
            Self::Mulaw => 8,
            Self::Pcm16 => 16,
        }
    }

    /// Parse a configured name or a media-stream MIME type such as
    /// `audio/x-mulaw` or `audio/x-l16`.
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_lowercase();
        let name = lowered.strip_prefix("audio/").unwrap_or(&lowered);
        let name = name.strip_prefix("x-").unwrap_or(name);
        match name {
            "mulaw" | "ulaw" | "pcmu" | "g711_ulaw" => Some(Self::Mulaw),
            "l16" | "pcm16" | "pcm" | "linear16" => Some(Self::Pcm16),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallAudioEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Converts frames between one call-leg encoding and one AI audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTransducer {
    call: CallAudioEncoding,
    ai: OpenAIRealtimeAudioFormat,
}

impl AudioTransducer {
    pub fn new(call: CallAudioEncoding, ai: OpenAIRealtimeAudioFormat) -> Self {
        Self { call, ai }
    }

    pub fn call_encoding(&self) -> CallAudioEncoding {
        self.call
    }

    pub fn ai_format(&self) -> OpenAIRealtimeAudioFormat {
        self.ai
    }

    /// Milliseconds of audio carried by a call-leg payload of `len` bytes.
    pub fn call_duration_ms(&self, len: usize) -> u64 {
        (len / self.call.bytes_per_ms()) as u64
    }

    fn is_passthrough(&self) -> bool {
        self.call == CallAudioEncoding::Mulaw && self.ai == OpenAIRealtimeAudioFormat::G711Ulaw
    }

    /// Convert a call-leg payload into the AI leg's input format.
    pub fn decode_inbound(&self, payload: &[u8]) -> Result<Bytes, CodecError> {
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }
        if self.is_passthrough() {
            return Ok(Bytes::copy_from_slice(payload));
        }

        let samples = match self.call {
            CallAudioEncoding::Mulaw => g711::decode_ulaw(payload),
            CallAudioEncoding::Pcm16 => pcm::bytes_to_samples(payload)?,
        };
        let samples = pcm::resample(&samples, CALL_SAMPLE_RATE, self.ai.sample_rate());

        Ok(Bytes::from(match self.ai {
            OpenAIRealtimeAudioFormat::Pcm16 => pcm::samples_to_bytes(&samples),
            OpenAIRealtimeAudioFormat::G711Ulaw => g711::encode_ulaw(&samples),
            OpenAIRealtimeAudioFormat::G711Alaw => g711::encode_alaw(&samples),
        }))
    }

    /// Convert an AI output payload into the call leg's encoding.
    pub fn encode_outbound(&self, payload: &[u8]) -> Result<Bytes, CodecError> {
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }
        if self.is_passthrough() {
            return Ok(Bytes::copy_from_slice(payload));
        }

        let samples = match self.ai {
            OpenAIRealtimeAudioFormat::Pcm16 => pcm::bytes_to_samples(payload)?,
            OpenAIRealtimeAudioFormat::G711Ulaw => g711::decode_ulaw(payload),
            OpenAIRealtimeAudioFormat::G711Alaw => g711::decode_alaw(payload),
        };
        let samples = pcm::resample(&samples, self.ai.sample_rate(), CALL_SAMPLE_RATE);

        Ok(Bytes::from(match self.call {
            CallAudioEncoding::Mulaw => g711::encode_ulaw(&samples),
            CallAudioEncoding::Pcm16 => pcm::samples_to_bytes(&samples),
        }))
    }
}

impl Default for AudioTransducer {
    fn default() -> Self {
        Self::new(
            CallAudioEncoding::default(),
            OpenAIRealtimeAudioFormat::default(),
        )
    }
}
