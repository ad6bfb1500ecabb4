//! Base types for dialing the AI leg of a call.
//!
//! The bridge never talks to a provider SDK directly. It asks an [`AiDialer`]
//! for an [`AiConnection`]: a sink it can write JSON text frames to and a
//! stream of inbound frames. What sits behind that (a real WebSocket, a test
//! double) is the dialer's business.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::bridge::leg::{LegInbound, LegSink};
use crate::core::realtime::openai::{
    Modality, OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeVoice,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while dialing or talking to the AI leg.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Provider refused the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Retry policy for dialing the AI leg.
///
/// Disabled by default: a refused dial is reported to the bridge straight
/// away and the configured failure policy applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialRetryConfig {
    /// Retry failed dials at all.
    pub enabled: bool,

    /// Total dial attempts, the first one included. 0 means unlimited.
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds).
    pub initial_delay_ms: u64,

    /// Upper bound for the delay between attempts (milliseconds).
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,

    /// Add up to 25% jitter to each delay.
    pub jitter: bool,
}

impl Default for DialRetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl DialRetryConfig {
    /// Retry up to `max_attempts` dials in total.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            enabled: max_attempts != 1,
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based), in milliseconds.
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(self.max_delay_ms as f64);

        if self.jitter {
            let jitter = rand_jitter(delay * 0.25);
            (delay + jitter).max(0.0) as u64
        } else {
            delay as u64
        }
    }

    /// Whether another dial is allowed after `attempt` attempts have failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempt < self.max_attempts)
    }
}

/// Pseudo-random jitter in `-range..=range` from a time-seeded LCG.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let random = ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % (1 << 31)) as f64;
    let normalized = random / (1u64 << 31) as f64;
    (normalized - 0.5) * 2.0 * range
}

/// Configuration of the AI session: where to dial and what to ask for.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
    /// API key sent as a bearer token
    pub api_key: String,

    /// WebSocket endpoint; the model is appended as a query parameter
    pub url: String,

    /// Model to use
    pub model: String,

    /// Voice for audio output
    pub voice: OpenAIRealtimeVoice,

    /// System instructions, passed through opaquely
    pub instructions: Option<String>,

    /// Response modalities
    pub modalities: Vec<Modality>,

    /// Audio format for both directions of the AI leg
    pub audio_format: OpenAIRealtimeAudioFormat,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: OPENAI_REALTIME_DEFAULT_MODEL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            instructions: None,
            modalities: vec![Modality::Text, Modality::Audio],
            audio_format: OpenAIRealtimeAudioFormat::default(),
            temperature: None,
        }
    }
}

// =============================================================================
// Dialer
// =============================================================================

/// An open AI leg: the write half and the read half.
pub struct AiConnection {
    pub sink: Box<dyn LegSink>,
    pub inbound: BoxStream<'static, LegInbound>,
}

/// Opens AI legs. One dial per call; retries are driven by the caller.
#[async_trait]
pub trait AiDialer: Send + Sync {
    async fn dial(&self) -> RealtimeResult<AiConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.model, "gpt-4o-realtime-preview-2024-10-01");
        assert_eq!(config.modalities, vec![Modality::Text, Modality::Audio]);
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::Timeout("dial".to_string());
        assert_eq!(err.to_string(), "Operation timed out: dial");
    }

    #[test]
    fn test_retry_disabled_by_default() {
        let config = DialRetryConfig::default();
        assert!(!config.enabled);
        assert!(!config.should_retry(1));
    }

    #[test]
    fn test_retry_attempts() {
        let config = DialRetryConfig::attempts(3);
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));

        assert!(!DialRetryConfig::attempts(1).should_retry(1));

        let unlimited = DialRetryConfig::attempts(0);
        assert!(unlimited.should_retry(u32::MAX - 1));
    }

    #[test]
    fn test_calculate_delay_no_jitter() {
        let config = DialRetryConfig {
            initial_delay_ms: 500,
            max_delay_ms: 3000,
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.calculate_delay(1), 500);
        assert_eq!(config.calculate_delay(2), 1000);
        assert_eq!(config.calculate_delay(3), 2000);
        assert_eq!(config.calculate_delay(4), 3000);
    }

    #[test]
    fn test_calculate_delay_with_jitter() {
        let config = DialRetryConfig {
            initial_delay_ms: 1000,
            jitter: true,
            ..Default::default()
        };

        let delay = config.calculate_delay(1);
        assert!((750..=1250).contains(&delay), "Delay {delay} should be within 750-1250");
    }
}
