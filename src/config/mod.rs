//! Configuration module for the call bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Parsing helpers shared by the loaders
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use crate::core::bridge::{AiDialFailurePolicy, BridgeConfig, OverflowPolicy};
use crate::core::codec::CallAudioEncoding;
use crate::core::realtime::openai::{
    Modality, OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_URL, ResponseConfig,
    build_session_config,
};
use crate::core::realtime::{
    DialRetryConfig, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, RealtimeConfig,
};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Holds everything the server needs: listener settings, AI session settings,
/// call-control webhook settings and bridge tuning.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
    /// Host name used in the `wss://<host>/media` stream URL when the
    /// webhook request carries no usable Host header
    pub public_host: Option<String>,
    /// Maximum simultaneous calls. `None` means unlimited.
    pub max_concurrent_calls: Option<usize>,

    // OpenAI Realtime
    pub openai_api_key: Option<String>,
    pub openai_realtime_url: String,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: OpenAIRealtimeVoice,
    pub ai_audio_format: OpenAIRealtimeAudioFormat,

    // Assistant behaviour, passed through opaquely
    pub agent_instructions: Option<String>,
    pub response_instructions: Option<String>,
    pub response_modalities: Vec<Modality>,

    // Call leg
    pub call_audio_encoding: CallAudioEncoding,
    pub max_call_duration_secs: u64,
    pub greeting_text: Option<String>,
    pub greeting_language: Option<String>,
    pub greeting_voice: Option<String>,

    // Bridge tuning
    pub commit_interval_ms: u64,
    /// Minimum appended audio before a tick commits; 0 commits every tick
    pub commit_min_audio_ms: u64,
    pub readiness_buffer_frames: usize,
    pub readiness_buffer_overflow: OverflowPolicy,
    pub ai_connect_timeout_secs: u64,
    pub ai_dial_failure: AiDialFailurePolicy,
    /// Total dial attempts per call, the first included
    pub ai_dial_max_attempts: u32,
    pub close_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
            public_host: None,
            max_concurrent_calls: None,
            openai_api_key: None,
            openai_realtime_url: OPENAI_REALTIME_URL.to_string(),
            openai_realtime_model: OPENAI_REALTIME_DEFAULT_MODEL.to_string(),
            openai_realtime_voice: OpenAIRealtimeVoice::default(),
            ai_audio_format: OpenAIRealtimeAudioFormat::default(),
            agent_instructions: None,
            response_instructions: None,
            response_modalities: vec![Modality::Audio, Modality::Text],
            call_audio_encoding: CallAudioEncoding::default(),
            max_call_duration_secs: 3600,
            greeting_text: None,
            greeting_language: None,
            greeting_voice: None,
            commit_interval_ms: 2000,
            commit_min_audio_ms: 0,
            readiness_buffer_frames: 250,
            readiness_buffer_overflow: OverflowPolicy::DropOldest,
            ai_connect_timeout_secs: 10,
            ai_dial_failure: AiDialFailurePolicy::Wait,
            ai_dial_max_attempts: 1,
            close_grace_ms: 2000,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("public_host", &self.public_host)
            .field("max_concurrent_calls", &self.max_concurrent_calls)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_realtime_url", &self.openai_realtime_url)
            .field("openai_realtime_model", &self.openai_realtime_model)
            .field("openai_realtime_voice", &self.openai_realtime_voice)
            .field("ai_audio_format", &self.ai_audio_format)
            .field("call_audio_encoding", &self.call_audio_encoding)
            .field("commit_interval_ms", &self.commit_interval_ms)
            .field("commit_min_audio_ms", &self.commit_min_audio_ms)
            .field("readiness_buffer_frames", &self.readiness_buffer_frames)
            .field("readiness_buffer_overflow", &self.readiness_buffer_overflow)
            .field("ai_dial_failure", &self.ai_dial_failure)
            .field("ai_dial_max_attempts", &self.ai_dial_max_attempts)
            .finish_non_exhaustive()
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs at startup, so its values are
    /// visible here as ordinary environment variables. Missing keys take
    /// their defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// AI session settings, including the API key.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.openai_realtime_url.clone(),
            model: self.openai_realtime_model.clone(),
            voice: self.openai_realtime_voice,
            instructions: self.agent_instructions.clone(),
            modalities: self.response_modalities.clone(),
            audio_format: self.ai_audio_format,
            temperature: None,
        }
    }

    /// Per-call bridge settings. Carries no secrets.
    pub fn bridge_config(&self) -> BridgeConfig {
        let mut realtime = self.realtime_config();
        realtime.api_key.clear();

        BridgeConfig {
            call_encoding: self.call_audio_encoding,
            ai_format: self.ai_audio_format,
            session: build_session_config(&realtime),
            response: ResponseConfig {
                modalities: Some(
                    self.response_modalities
                        .iter()
                        .map(|m| m.as_str().to_string())
                        .collect(),
                ),
                instructions: self.response_instructions.clone(),
                ..Default::default()
            },
            commit_interval: Duration::from_millis(self.commit_interval_ms),
            commit_min_audio: Duration::from_millis(self.commit_min_audio_ms),
            buffer_capacity: self.readiness_buffer_frames,
            overflow: self.readiness_buffer_overflow,
            max_call_duration: Duration::from_secs(self.max_call_duration_secs),
            ai_connect_timeout: Duration::from_secs(self.ai_connect_timeout_secs),
            dial_failure: self.ai_dial_failure,
            dial_retry: DialRetryConfig::attempts(self.ai_dial_max_attempts),
            close_grace: Duration::from_millis(self.close_grace_ms),
        }
    }
}
