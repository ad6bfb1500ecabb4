//! Mock AI Provider Servers
//!
//! - `realtime_mock` - OpenAI Realtime style WebSocket server
//!
//! Includes failure modes:
//! - Handshake refusal with an HTTP status
//! - Dropping the connection after the session is created

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collector for a mock server
#[derive(Debug, Default)]
pub struct MockStats {
    pub connections: AtomicU64,
    pub rejected: AtomicU64,
    pub responses_sent: AtomicU64,
    pub closed_by_peer: AtomicU64,
}

impl MockStats {
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::SeqCst)
    }

    pub fn closed_by_peer(&self) -> u64 {
        self.closed_by_peer.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> String {
        format!(
            "Connections: {}, Rejected: {}, Responses: {}, ClosedByPeer: {}",
            self.connections(),
            self.rejected(),
            self.responses_sent(),
            self.closed_by_peer()
        )
    }
}
