//! Per-call bridge settings, derived once from the server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::buffer::OverflowPolicy;
use crate::core::codec::CallAudioEncoding;
use crate::core::realtime::openai::{OpenAIRealtimeAudioFormat, ResponseConfig, SessionConfig};
use crate::core::realtime::DialRetryConfig;

/// What a bridge does when the AI leg cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDialFailurePolicy {
    /// Keep the call leg open in `Connecting` until the caller hangs up
    #[default]
    Wait,
    /// Close the call leg
    HangUp,
}

impl AiDialFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "wait" => Some(Self::Wait),
            "hang_up" | "hangup" => Some(Self::HangUp),
            _ => None,
        }
    }
}

/// Everything a [`SessionBridge`](super::SessionBridge) needs to run one call.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Call-leg encoding unless the `start` frame declares another
    pub call_encoding: CallAudioEncoding,
    pub ai_format: OpenAIRealtimeAudioFormat,
    /// Sent as `session.update` when the AI leg opens
    pub session: SessionConfig,
    /// Forwarded with every `response.create`
    pub response: ResponseConfig,
    pub commit_interval: Duration,
    /// Zero commits on every tick
    pub commit_min_audio: Duration,
    pub buffer_capacity: usize,
    pub overflow: OverflowPolicy,
    pub max_call_duration: Duration,
    /// Per dial attempt
    pub ai_connect_timeout: Duration,
    pub dial_failure: AiDialFailurePolicy,
    pub dial_retry: DialRetryConfig,
    pub close_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_encoding: CallAudioEncoding::Mulaw,
            ai_format: OpenAIRealtimeAudioFormat::default(),
            session: SessionConfig::default(),
            response: ResponseConfig::default(),
            commit_interval: Duration::from_millis(2000),
            commit_min_audio: Duration::ZERO,
            buffer_capacity: 250,
            overflow: OverflowPolicy::DropOldest,
            max_call_duration: Duration::from_secs(3600),
            ai_connect_timeout: Duration::from_secs(10),
            dial_failure: AiDialFailurePolicy::Wait,
            dial_retry: DialRetryConfig::default(),
            close_grace: Duration::from_millis(2000),
        }
    }
}
