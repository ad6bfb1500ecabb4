//! Bridge Scenario Tests
//!
//! Drives a full `SessionBridge::run` with in-memory legs and a scripted
//! dialer, on paused time. Covers the call lifecycle end to end: buffering
//! before the AI leg opens, direct forwarding afterwards, turn commits,
//! teardown from either side and the registry slot release.

mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use callbridge::core::bridge::{
    AiDialFailurePolicy, BridgeConfig, BridgeRegistry, BridgeState, CallSession, CloseReason,
    LegError, LegInbound, LegSink, SessionBridge,
};
use callbridge::core::realtime::{
    AiConnection, AiDialer, DialRetryConfig, RealtimeError, RealtimeResult,
};

use fixtures::*;

// =============================================================================
// In-memory legs
// =============================================================================

/// Records what the bridge writes to a leg and how often it is closed.
/// Holds the sending half of the leg's inbound stream, the way a socket
/// peer would; closing the leg ends that stream unless the peer ignores it.
#[derive(Clone, Default)]
struct RecordingLeg {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    peer: Arc<Mutex<Option<UnboundedSender<LegInbound>>>>,
    ignores_close: bool,
}

impl RecordingLeg {
    fn connected(ignores_close: bool) -> (Self, BoxStream<'static, LegInbound>) {
        let (tx, rx) = unbounded();
        let leg = Self {
            peer: Arc::new(Mutex::new(Some(tx))),
            ignores_close,
            ..Default::default()
        };
        (leg, rx.boxed())
    }

    fn boxed(&self) -> Box<dyn LegSink> {
        Box::new(RecordingSink {
            leg: self.clone(),
            open: true,
        })
    }

    /// Deliver a frame to the bridge from the far side of this leg
    fn receive(&self, text: String) {
        if let Some(tx) = self.peer.lock().unwrap().as_ref() {
            let _ = tx.unbounded_send(LegInbound::Text(text));
        }
    }

    /// The far side goes away
    fn disconnect(&self) {
        self.peer.lock().unwrap().take();
    }

    fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    fn field(&self, key: &str) -> Vec<String> {
        self.sent()
            .iter()
            .map(|v| v[key].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct RecordingSink {
    leg: RecordingLeg,
    open: bool,
}

#[async_trait]
impl LegSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), LegError> {
        if !self.open {
            return Err(LegError::Closed);
        }
        self.leg.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.leg.closes.fetch_add(1, Ordering::SeqCst);
            if !self.leg.ignores_close {
                self.leg.disconnect();
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Dialer that fails a set number of times, then hands out one in-memory
/// AI leg
struct ScriptedDialer {
    attempts: AtomicUsize,
    failures: usize,
    failure: fn() -> RealtimeError,
    delay: Duration,
    ai: RecordingLeg,
    ai_inbound: Mutex<Option<BoxStream<'static, LegInbound>>>,
}

#[async_trait]
impl AiDialer for ScriptedDialer {
    async fn dial(&self) -> RealtimeResult<AiConnection> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        sleep(self.delay).await;
        if attempt <= self.failures {
            return Err((self.failure)());
        }

        let inbound = self
            .ai_inbound
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RealtimeError::ConnectionFailed("already dialed".to_string()))?;
        Ok(AiConnection {
            sink: self.ai.boxed(),
            inbound,
        })
    }
}

fn refused() -> RealtimeError {
    RealtimeError::ConnectionFailed("connection refused".to_string())
}

fn unauthorized() -> RealtimeError {
    RealtimeError::AuthenticationFailed("HTTP 401 Unauthorized".to_string())
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    call: RecordingLeg,
    ai: RecordingLeg,
    dialer: Arc<ScriptedDialer>,
    registry: Arc<BridgeRegistry>,
    bridge: JoinHandle<CallSession>,
}

struct Script {
    config: BridgeConfig,
    failures: usize,
    failure: fn() -> RealtimeError,
    delay: Duration,
    /// The AI side never acknowledges a close
    ai_ignores_close: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            config: BridgeConfig::default(),
            failures: 0,
            failure: refused,
            delay: Duration::ZERO,
            ai_ignores_close: false,
        }
    }
}

impl Harness {
    fn start(script: Script) -> Self {
        let (call, call_inbound) = RecordingLeg::connected(false);
        let (ai, ai_inbound) = RecordingLeg::connected(script.ai_ignores_close);

        let dialer = Arc::new(ScriptedDialer {
            attempts: AtomicUsize::new(0),
            failures: script.failures,
            failure: script.failure,
            delay: script.delay,
            ai: ai.clone(),
            ai_inbound: Mutex::new(Some(ai_inbound)),
        });

        let registry = Arc::new(BridgeRegistry::new(Some(4)));
        let permit = registry.try_reserve().unwrap();
        let bridge =
            SessionBridge::new(permit.id(), script.config, call.boxed()).with_permit(permit);
        let bridge = tokio::spawn(bridge.run(call_inbound, dialer.clone() as Arc<dyn AiDialer>));

        Self {
            call,
            ai,
            dialer,
            registry,
            bridge,
        }
    }

    fn call_sends(&self, text: String) {
        self.call.receive(text);
    }

    fn ai_sends(&self, event: Value) {
        self.ai.receive(event.to_string());
    }

    /// The caller hangs up: the call-leg stream ends
    fn hang_up_call(&self) {
        self.call.disconnect();
    }

    /// The AI service drops the socket
    fn drop_ai(&self) {
        self.ai.disconnect();
    }

    async fn finished(self) -> CallSession {
        tokio::time::timeout(Duration::from_secs(3600 * 2), self.bridge)
            .await
            .expect("bridge did not finish")
            .expect("bridge task panicked")
    }
}

/// Poll `condition`, advancing paused time one millisecond per try
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(1)).await;
    }
    assert!(condition(), "condition not met");
}

fn passthrough() -> BridgeConfig {
    BridgeConfig {
        ai_format: callbridge::core::realtime::OpenAIRealtimeAudioFormat::G711Ulaw,
        ..Default::default()
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_call_lifecycle() {
    let h = Harness::start(Script::default());

    h.call_sends(connected_event());
    h.call_sends(start_event("MZ1"));
    for frame in mulaw_speech_frames(3) {
        h.call_sends(media_event("MZ1", &frame));
    }

    wait_until(|| h.ai.sent().len() == 4).await;
    assert_eq!(
        h.ai.field("type"),
        vec![
            "session.update",
            "input_audio_buffer.append",
            "input_audio_buffer.append",
            "input_audio_buffer.append"
        ]
    );
    let update = &h.ai.sent()[0];
    assert!(update["session"]["turn_detection"].is_null());

    // 20ms of PCM16 at 24kHz comes back as 20ms of mu-law at 8kHz
    h.ai_sends(json!({
        "type": "response.output_audio.delta",
        "response_id": "resp_1",
        "delta": BASE64_STANDARD.encode(vec![0u8; 960])
    }));
    h.ai_sends(json!({
        "type": "response.completed",
        "response": {"id": "resp_1", "status": "completed"}
    }));

    wait_until(|| h.call.sent().len() == 2).await;
    let sent = h.call.sent();
    assert_eq!(sent[0]["event"], "media");
    assert_eq!(sent[0]["streamSid"], "MZ1");
    let payload = BASE64_STANDARD
        .decode(sent[0]["media"]["payload"].as_str().unwrap())
        .unwrap();
    assert_eq!(payload.len(), FRAME_SAMPLES);
    assert_eq!(sent[1], json!({"event": "mark", "streamSid": "MZ1", "mark": {"name": "done"}}));

    h.call_sends(stop_event("MZ1"));
    wait_until(|| h.call.closes() == 1).await;

    let types = h.ai.field("type");
    assert_eq!(&types[4..], ["input_audio_buffer.commit", "response.create"]);
    assert_eq!(h.ai.closes(), 1);

    let registry = Arc::clone(&h.registry);
    let session = h.finished().await;

    assert_eq!(session.state, BridgeState::Closed);
    assert_eq!(session.close_reason, Some(CloseReason::CallStopped));
    assert_eq!(session.stream_sid.as_deref(), Some("MZ1"));
    assert_eq!(session.stats.frames_in, 3);
    assert_eq!(session.stats.frames_out, 1);
    assert_eq!(session.stats.commits_sent, 1);
    assert_eq!(registry.active_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_frames_before_slow_dial_are_flushed_in_order() {
    let h = Harness::start(Script {
        config: passthrough(),
        delay: Duration::from_millis(300),
        ..Default::default()
    });

    let frames: Vec<Vec<u8>> = (1u8..=3).map(|b| vec![b; FRAME_SAMPLES]).collect();
    for frame in &frames {
        h.call_sends(media_event("MZ1", frame));
    }
    sleep(Duration::from_millis(100)).await;
    assert!(h.ai.sent().is_empty());

    wait_until(|| h.ai.sent().len() == 4).await;
    h.call_sends(media_event("MZ1", &[4u8; FRAME_SAMPLES]));
    wait_until(|| h.ai.sent().len() == 5).await;

    let audio: Vec<u8> = h.ai.sent()[1..]
        .iter()
        .map(|v| BASE64_STANDARD.decode(v["audio"].as_str().unwrap()).unwrap()[0])
        .collect();
    assert_eq!(audio, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_commit_cadence() {
    let h = Harness::start(Script::default());
    h.call_sends(media_event("MZ1", &mulaw_tone_frame()));
    wait_until(|| h.ai.sent().len() == 2).await;

    // First tick lands one interval after the AI leg opened
    sleep(Duration::from_millis(1900)).await;
    assert!(!h.ai.field("type").contains(&"input_audio_buffer.commit".to_string()));

    sleep(Duration::from_millis(200)).await;
    let types = h.ai.field("type");
    assert_eq!(&types[2..], ["input_audio_buffer.commit", "response.create"]);

    sleep(Duration::from_millis(2000)).await;
    let commits = h
        .ai
        .field("type")
        .iter()
        .filter(|t| *t == "input_audio_buffer.commit")
        .count();
    assert_eq!(commits, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dial_retries_then_opens() {
    let mut config = passthrough();
    config.dial_retry = DialRetryConfig {
        jitter: false,
        ..DialRetryConfig::attempts(3)
    };
    let h = Harness::start(Script {
        config,
        failures: 2,
        ..Default::default()
    });

    h.call_sends(media_event("MZ1", &mulaw_tone_frame()));
    // 500ms then 1000ms of backoff
    sleep(Duration::from_millis(1400)).await;
    assert!(h.ai.sent().is_empty());

    wait_until(|| h.ai.sent().len() == 2).await;
    assert_eq!(h.dialer.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_refused_dial_hang_up_policy() {
    let mut config = passthrough();
    config.dial_failure = AiDialFailurePolicy::HangUp;
    config.dial_retry = DialRetryConfig::attempts(3);
    let h = Harness::start(Script {
        config,
        failures: usize::MAX,
        failure: unauthorized,
        ..Default::default()
    });

    let session = h.finished().await;
    assert!(matches!(
        session.close_reason,
        Some(CloseReason::AiDialFailed(ref e)) if e.contains("401")
    ));
    assert_eq!(session.state, BridgeState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_dial_timeout_hang_up_policy() {
    let mut config = passthrough();
    config.dial_failure = AiDialFailurePolicy::HangUp;
    let h = Harness::start(Script {
        config,
        delay: Duration::from_secs(60),
        ..Default::default()
    });
    let call = h.call.clone();

    let session = h.finished().await;
    assert!(matches!(session.close_reason, Some(CloseReason::AiDialFailed(_))));
    assert_eq!(call.closes(), 1);
    // Ten second connect timeout
    let elapsed = session.started_at.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_refused_dial_wait_policy_holds_call() {
    let h = Harness::start(Script {
        config: passthrough(),
        failures: usize::MAX,
        ..Default::default()
    });

    sleep(Duration::from_secs(30)).await;
    h.call_sends(media_event("MZ1", &mulaw_tone_frame()));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.call.closes(), 0);
    assert_eq!(h.registry.active_calls(), 1);

    h.hang_up_call();
    let registry = Arc::clone(&h.registry);
    let session = h.finished().await;
    assert_eq!(session.close_reason, Some(CloseReason::CallLegClosed));
    assert_eq!(session.stats.frames_in, 1);
    assert_eq!(registry.active_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_call_hang_up_closes_ai_leg_once() {
    let h = Harness::start(Script::default());
    wait_until(|| h.ai.sent().len() == 1).await;

    h.hang_up_call();
    let ai = h.ai.clone();
    let session = h.finished().await;

    assert_eq!(ai.closes(), 1);
    // Nothing after session.update
    assert_eq!(ai.sent().len(), 1);
    assert_eq!(session.close_reason, Some(CloseReason::CallLegClosed));
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_durations_do_not_overflow() {
    let config = BridgeConfig {
        max_call_duration: Duration::MAX,
        close_grace: Duration::MAX,
        commit_interval: Duration::MAX,
        ..passthrough()
    };
    let h = Harness::start(Script {
        config,
        ..Default::default()
    });
    h.call_sends(start_event("MZ-long"));
    h.call_sends(media_event("MZ-long", &mulaw_tone_frame()));
    wait_until(|| h.ai.sent().len() == 2).await;

    h.hang_up_call();
    let ai = h.ai.clone();
    let session = h.finished().await;

    assert_eq!(session.state, BridgeState::Closed);
    assert_eq!(session.close_reason, Some(CloseReason::CallLegClosed));
    assert_eq!(ai.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ai_leg_drop_closes_call_leg() {
    let h = Harness::start(Script::default());
    wait_until(|| h.ai.sent().len() == 1).await;

    h.drop_ai();
    let (call, ai) = (h.call.clone(), h.ai.clone());
    let session = h.finished().await;

    assert_eq!(session.close_reason, Some(CloseReason::AiLegClosed));
    assert_eq!(session.state, BridgeState::Closed);
    assert_eq!(call.closes(), 1);
    assert_eq!(ai.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_max_call_duration() {
    let config = BridgeConfig {
        max_call_duration: Duration::from_secs(5),
        close_grace: Duration::from_secs(1),
        ..passthrough()
    };
    let h = Harness::start(Script {
        config,
        ai_ignores_close: true,
        ..Default::default()
    });
    let (call, ai) = (h.call.clone(), h.ai.clone());

    let session = h.finished().await;
    assert_eq!(session.close_reason, Some(CloseReason::MaxDurationElapsed));
    assert_eq!(call.closes(), 1);
    assert_eq!(ai.closes(), 1);
    // Five seconds of call, one of grace for the AI side
    let elapsed = session.started_at.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_audio_delta_after_call_leg_closed_is_dropped() {
    let h = Harness::start(Script {
        ai_ignores_close: true,
        ..Default::default()
    });
    wait_until(|| h.ai.sent().len() == 1).await;

    h.hang_up_call();
    wait_until(|| h.ai.closes() == 1).await;

    h.ai_sends(json!({
        "type": "response.audio.delta",
        "delta": BASE64_STANDARD.encode(vec![0u8; 960])
    }));
    sleep(Duration::from_millis(10)).await;
    assert!(h.call.sent().is_empty());

    let session = h.finished().await;
    assert_eq!(session.stats.frames_out, 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_survived() {
    let h = Harness::start(Script::default());
    wait_until(|| h.ai.sent().len() == 1).await;

    h.call_sends("garbage".to_string());
    h.call_sends(r#"{"event":"media","media":{"payload":"!!"}}"#.to_string());
    h.ai_sends(json!({"type": "response.audio.delta", "delta": "!!"}));
    h.ai_sends(json!({"type": "conversation.item.created", "item": {}}));
    h.ai_sends(json!({
        "type": "error",
        "error": {"type": "invalid_request_error", "message": "bad"}
    }));
    h.call_sends(media_event("MZ1", &mulaw_tone_frame()));

    wait_until(|| h.ai.sent().len() == 2).await;
    assert_eq!(h.ai.field("type")[1], "input_audio_buffer.append");
    assert_eq!(h.call.closes(), 0);
    assert_eq!(h.registry.active_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ids_are_unique_per_call() {
    let registry = Arc::new(BridgeRegistry::default());
    let ids: Vec<Uuid> = (0..10)
        .map(|_| registry.try_reserve().unwrap())
        .map(|permit| permit.id())
        .collect();
    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len());
}
