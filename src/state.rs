use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::bridge::{BridgeConfig, BridgeRegistry};
use crate::core::realtime::{AiDialer, OpenAIRealtimeDialer, RealtimeResult};

/// Application state shared by every handler
pub struct AppState {
    pub config: ServerConfig,
    /// Live calls and the capacity guard
    pub registry: Arc<BridgeRegistry>,
    /// Opens one AI leg per call
    pub dialer: Arc<dyn AiDialer>,
    /// Per-call settings, derived once at startup
    pub bridge_config: BridgeConfig,
}

impl AppState {
    /// Build the state with the OpenAI Realtime dialer.
    ///
    /// Fails when the AI session settings are unusable, for example when no
    /// API key is configured.
    pub fn new(config: ServerConfig) -> RealtimeResult<Arc<Self>> {
        let dialer = OpenAIRealtimeDialer::new(&config.realtime_config())?;
        Ok(Self::with_dialer(config, Arc::new(dialer)))
    }

    /// Build the state around any dialer.
    pub fn with_dialer(config: ServerConfig, dialer: Arc<dyn AiDialer>) -> Arc<Self> {
        let registry = Arc::new(BridgeRegistry::new(config.max_concurrent_calls));
        let bridge_config = config.bridge_config();

        Arc::new(Self {
            config,
            registry,
            dialer,
            bridge_config,
        })
    }
}
