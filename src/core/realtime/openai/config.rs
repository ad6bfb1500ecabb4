//! OpenAI Realtime API configuration types.
//!
//! Endpoint, default model, voices, audio formats and output modalities.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model dialed when none is configured.
pub const OPENAI_REALTIME_DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Sample rate of the `pcm16` format.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Build the dial URL: the endpoint with `model` set as a query parameter.
///
/// Any existing `model` parameter on the endpoint is replaced.
pub fn realtime_url(endpoint: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        RealtimeError::InvalidConfiguration(format!("Invalid realtime URL {endpoint}: {e}"))
    })?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Realtime URL must use ws or wss, got {other}"
            )));
        }
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "model")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("model", model);
    Ok(url)
}

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Strict parse, used by configuration validation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats accepted and produced by the realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeAudioFormat {
    /// PCM 16-bit signed little-endian, 24 kHz (default)
    #[default]
    Pcm16,
    /// G.711 u-law, 8 kHz
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law, 8 kHz
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl OpenAIRealtimeAudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => OPENAI_REALTIME_SAMPLE_RATE,
            Self::G711Ulaw | Self::G711Alaw => 8000,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pcm16" | "pcm" | "linear16" => Some(Self::Pcm16),
            "g711_ulaw" | "ulaw" | "mulaw" => Some(Self::G711Ulaw),
            "g711_alaw" | "alaw" => Some(Self::G711Alaw),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

impl Modality {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Parse a comma-separated list such as `"text,audio"`.
    pub fn parse_list(s: &str) -> Option<Vec<Self>> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
