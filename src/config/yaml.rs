use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   public_host: "bridge.example.com"
///   max_concurrent_calls: 100
///   tls:
///     cert_path: "/etc/callbridge/cert.pem"
///     key_path: "/etc/callbridge/key.pem"
///
/// openai:
///   api_key: "sk-..."
///   realtime_url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   audio_format: "pcm16"
///
/// agent:
///   instructions: "You are a friendly receptionist."
///   response_instructions: "Answer briefly."
///   response_modalities: ["audio", "text"]
///
/// call:
///   audio_encoding: "mulaw"
///   max_duration_secs: 3600
///   greeting:
///     text: "Connecting you now."
///     language: "en-US"
///     voice: "Polly.Joanna"
///
/// bridge:
///   commit_interval_ms: 2000
///   commit_min_audio_ms: 0
///   readiness_buffer_frames: 250
///   readiness_buffer_overflow: "drop_oldest"
///   ai_connect_timeout_secs: 10
///   ai_dial_failure: "wait"
///   ai_dial_max_attempts: 1
///   close_grace_ms: 2000
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub agent: Option<AgentYaml>,
    pub call: Option<CallYaml>,
    pub bridge: Option<BridgeYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
    /// Host name the telephony provider reaches us on, used in TwiML
    pub public_host: Option<String>,
    pub max_concurrent_calls: Option<usize>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// OpenAI Realtime connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    /// pcm16, g711_ulaw or g711_alaw
    pub audio_format: Option<String>,
}

/// Assistant behaviour, passed through to the AI session untouched
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub instructions: Option<String>,
    pub response_instructions: Option<String>,
    pub response_modalities: Option<Vec<String>>,
}

/// Call-leg settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallYaml {
    /// mulaw or pcm16
    pub audio_encoding: Option<String>,
    pub max_duration_secs: Option<u64>,
    pub greeting: Option<GreetingYaml>,
}

/// Greeting spoken by the call-control webhook before streaming starts
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GreetingYaml {
    pub text: Option<String>,
    pub language: Option<String>,
    pub voice: Option<String>,
}

/// Bridge tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub commit_interval_ms: Option<u64>,
    pub commit_min_audio_ms: Option<u64>,
    pub readiness_buffer_frames: Option<usize>,
    /// drop_oldest or disconnect
    pub readiness_buffer_overflow: Option<String>,
    pub ai_connect_timeout_secs: Option<u64>,
    /// wait or hang_up
    pub ai_dial_failure: Option<String>,
    pub ai_dial_max_attempts: Option<u32>,
    pub close_grace_ms: Option<u64>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
