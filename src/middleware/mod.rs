pub mod connection_limit;

// Re-export middleware functions
pub use connection_limit::{ReservedCall, connection_limit_middleware};
