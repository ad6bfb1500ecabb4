//! One bridge per call: joins the call leg's media stream to an AI session.
//!
//! - `leg` - transport-neutral sink/stream view of both WebSockets
//! - `messages` - call-leg media stream protocol
//! - `buffer` - frames held until the AI leg is ready
//! - `scheduler` - commit cadence and turn policy
//! - `session` - per-call state record
//! - `session_bridge` - the actor
//! - `registry` - live calls and the capacity guard

pub mod buffer;
pub mod config;
pub mod error;
pub mod leg;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod session_bridge;

pub use buffer::{OverflowPolicy, PushOutcome, ReadinessBuffer};
pub use config::{AiDialFailurePolicy, BridgeConfig};
pub use error::{BridgeError, BridgeResult};
pub use leg::{LegError, LegInbound, LegSink, SinkLeg, inbound_stream};
pub use messages::{CallLegEvent, CallLegOutbound};
pub use registry::{BridgeRegistry, CallPermit, CapacityError};
pub use scheduler::{CommitScheduler, FixedCadence, MinimumAudio, TurnPolicy};
pub use session::{BridgeState, CallSession, CallStats, CloseReason};
pub use session_bridge::{BridgeEvent, SessionBridge};
