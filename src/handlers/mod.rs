//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice` - Call-control webhook answering with TwiML
//! - `media` - Media stream WebSocket, one bridge per connection

pub mod api;
pub mod media;
pub mod voice;

pub use media::media_handler;
pub use voice::voice_webhook;
