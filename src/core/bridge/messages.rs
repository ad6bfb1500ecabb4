//! Call-leg media stream message types.
//!
//! Inbound (telephony provider -> bridge):
//! - connected - socket established
//! - start - stream metadata, including the declared media format
//! - media - one base64 audio chunk
//! - mark - echo of a marker the bridge sent earlier
//! - stop - the call ended
//!
//! Outbound (bridge -> telephony provider):
//! - media - one base64 audio chunk to play
//! - mark - turn marker, named `done` when a response completes

use serde::{Deserialize, Serialize};

/// Name of the marker sent after each completed response.
pub const RESPONSE_DONE_MARK: &str = "done";

// =============================================================================
// Incoming Messages (Call leg -> Bridge)
// =============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CallLegEvent {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        start: Option<StartMetadata>,
    },

    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },

    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },

    /// Any other event name
    #[serde(other)]
    Unknown,
}

impl CallLegEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    #[serde(default)]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

/// Format the provider declares for the stream, e.g. `audio/x-mulaw` at 8000 Hz.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MediaPayload {
    /// `inbound` (caller audio) or `outbound` (our own audio echoed back)
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub payload: String,
}

impl MediaPayload {
    pub fn is_outbound_track(&self) -> bool {
        self.track.as_deref() == Some("outbound")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MarkPayload {
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Outgoing Messages (Bridge -> Call leg)
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CallLegOutbound {
    Media {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: OutboundMedia,
    },

    Mark {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        mark: MarkPayload,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMedia {
    /// Base64 audio in the call leg's encoding
    pub payload: String,
}

impl CallLegOutbound {
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        Self::Media {
            stream_sid,
            media: OutboundMedia { payload },
        }
    }

    pub fn response_done(stream_sid: Option<String>) -> Self {
        Self::Mark {
            stream_sid,
            mark: MarkPayload {
                name: RESPONSE_DONE_MARK.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
