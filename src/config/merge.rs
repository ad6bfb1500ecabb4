//! Merging YAML and environment configurations.

use std::path::PathBuf;

use super::utils::{
    parse_audio_format, parse_call_encoding, parse_dial_failure, parse_modalities,
    parse_overflow, parse_voice,
};
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};

/// Build the configuration: defaults, then environment, then YAML.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();
    env::apply_env(&mut config)?;

    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), String> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(public_host) = server.public_host {
            config.public_host = Some(public_host);
        }
        if let Some(max) = server.max_concurrent_calls {
            config.max_concurrent_calls = (max > 0).then_some(max);
        }
        if let Some(tls) = server.tls {
            match (tls.enabled, tls.cert_path, tls.key_path) {
                (Some(false), _, _) => config.tls = None,
                (_, Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                }
                (Some(true), _, _) => {
                    return Err("server.tls requires both cert_path and key_path".to_string());
                }
                _ => {}
            }
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(key) = openai.api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = openai.realtime_url {
            config.openai_realtime_url = url;
        }
        if let Some(model) = openai.model {
            config.openai_realtime_model = model;
        }
        if let Some(voice) = openai.voice {
            config.openai_realtime_voice = parse_voice("openai.voice", &voice)?;
        }
        if let Some(format) = openai.audio_format {
            config.ai_audio_format = parse_audio_format("openai.audio_format", &format)?;
        }
    }

    if let Some(agent) = yaml.agent {
        if let Some(instructions) = agent.instructions {
            config.agent_instructions = Some(instructions);
        }
        if let Some(instructions) = agent.response_instructions {
            config.response_instructions = Some(instructions);
        }
        if let Some(modalities) = agent.response_modalities {
            config.response_modalities =
                parse_modalities("agent.response_modalities", &modalities.join(","))?;
        }
    }

    if let Some(call) = yaml.call {
        if let Some(encoding) = call.audio_encoding {
            config.call_audio_encoding = parse_call_encoding("call.audio_encoding", &encoding)?;
        }
        if let Some(secs) = call.max_duration_secs {
            config.max_call_duration_secs = secs;
        }
        if let Some(greeting) = call.greeting {
            if let Some(text) = greeting.text {
                config.greeting_text = Some(text);
            }
            if let Some(language) = greeting.language {
                config.greeting_language = Some(language);
            }
            if let Some(voice) = greeting.voice {
                config.greeting_voice = Some(voice);
            }
        }
    }

    if let Some(bridge) = yaml.bridge {
        if let Some(ms) = bridge.commit_interval_ms {
            config.commit_interval_ms = ms;
        }
        if let Some(ms) = bridge.commit_min_audio_ms {
            config.commit_min_audio_ms = ms;
        }
        if let Some(frames) = bridge.readiness_buffer_frames {
            config.readiness_buffer_frames = frames;
        }
        if let Some(policy) = bridge.readiness_buffer_overflow {
            config.readiness_buffer_overflow =
                parse_overflow("bridge.readiness_buffer_overflow", &policy)?;
        }
        if let Some(secs) = bridge.ai_connect_timeout_secs {
            config.ai_connect_timeout_secs = secs;
        }
        if let Some(policy) = bridge.ai_dial_failure {
            config.ai_dial_failure = parse_dial_failure("bridge.ai_dial_failure", &policy)?;
        }
        if let Some(attempts) = bridge.ai_dial_max_attempts {
            config.ai_dial_max_attempts = attempts;
        }
        if let Some(ms) = bridge.close_grace_ms {
            config.close_grace_ms = ms;
        }
    }

    Ok(())
}
