//! Call bridging core: audio transcoding, the AI session client and the
//! per-call bridge actor.

pub mod bridge;
pub mod codec;
pub mod realtime;

pub use bridge::{
    AiDialFailurePolicy, BridgeConfig, BridgeEvent, BridgeRegistry, BridgeState, CallSession,
    SessionBridge,
};
pub use codec::{AudioTransducer, CallAudioEncoding, CodecError};
pub use realtime::{AiDialer, OpenAIRealtimeDialer, RealtimeConfig, RealtimeError};
