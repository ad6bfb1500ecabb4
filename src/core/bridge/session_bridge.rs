//! The per-call actor joining a telephony media stream to an AI session.
//!
//! One task runs [`SessionBridge::run`] for the whole life of a call. It owns
//! both leg sinks, the readiness buffer, the commit timer and the
//! [`CallSession`] record; every other task (the call-leg reader, the AI
//! dialer and reader, the commit timer) only posts [`BridgeEvent`]s into its
//! queue.
//!
//! ```text
//! call leg --media--> decode_inbound --> buffer | AI leg (input_audio_buffer.append)
//! AI leg --audio delta--> encode_outbound --> call leg (media)
//! AI leg --response done--> call leg (mark "done")
//! commit tick --> AI leg (input_audio_buffer.commit, response.create)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::buffer::{PushOutcome, ReadinessBuffer};
use super::config::{AiDialFailurePolicy, BridgeConfig};
use super::error::{BridgeError, BridgeResult};
use super::leg::{LegError, LegInbound, LegSink, pump};
use super::messages::{CallLegEvent, CallLegOutbound, MediaPayload, StartMetadata};
use super::registry::CallPermit;
use super::scheduler::{CommitScheduler, TurnPolicy, deadline_after, turn_policy_for};
use super::session::{BridgeState, CallSession, CloseReason};
use crate::core::codec::{AudioTransducer, CallAudioEncoding};
use crate::core::realtime::{
    AiConnection, AiDialer, ClientEvent, DialRetryConfig, RealtimeError, RealtimeResult,
    ServerEvent,
};

/// Capacity of the bridge's event queue
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Everything the bridge reacts to, merged into one queue.
pub enum BridgeEvent {
    /// Item read from the call leg
    CallLeg(LegInbound),
    /// The AI leg is open; its reader starts posting [`BridgeEvent::AiLeg`]
    AiOpened(Box<dyn LegSink>),
    /// Every dial attempt failed
    AiDialFailed(String),
    /// Item read from the AI leg
    AiLeg(LegInbound),
    CommitTick,
}

impl fmt::Debug for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallLeg(item) => f.debug_tuple("CallLeg").field(item).finish(),
            Self::AiOpened(_) => f.write_str("AiOpened"),
            Self::AiDialFailed(reason) => f.debug_tuple("AiDialFailed").field(reason).finish(),
            Self::AiLeg(item) => f.debug_tuple("AiLeg").field(item).finish(),
            Self::CommitTick => f.write_str("CommitTick"),
        }
    }
}

pub struct SessionBridge {
    session: CallSession,
    config: BridgeConfig,
    transducer: AudioTransducer,

    call_leg: Option<Box<dyn LegSink>>,
    ai_leg: Option<Box<dyn LegSink>>,
    call_leg_done: bool,
    ai_leg_done: bool,

    pending_outbound: ReadinessBuffer,
    commit_timer: CommitScheduler<BridgeEvent>,
    turn_policy: Box<dyn TurnPolicy>,

    events_tx: mpsc::Sender<BridgeEvent>,
    events_rx: Option<mpsc::Receiver<BridgeEvent>>,
    call_pump: Option<JoinHandle<()>>,
    dial_task: Option<JoinHandle<()>>,
    close_deadline: Option<Instant>,
    permit: Option<CallPermit>,
}

impl SessionBridge {
    pub fn new(id: Uuid, config: BridgeConfig, call_leg: Box<dyn LegSink>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let transducer = AudioTransducer::new(config.call_encoding, config.ai_format);

        Self {
            session: CallSession::new(id, config.call_encoding),
            transducer,
            call_leg: Some(call_leg),
            ai_leg: None,
            call_leg_done: false,
            ai_leg_done: false,
            pending_outbound: ReadinessBuffer::new(config.buffer_capacity, config.overflow),
            commit_timer: CommitScheduler::new(events_tx.clone(), || BridgeEvent::CommitTick),
            turn_policy: turn_policy_for(config.commit_min_audio),
            events_tx,
            events_rx: Some(events_rx),
            call_pump: None,
            dial_task: None,
            close_deadline: None,
            permit: None,
            config,
        }
    }

    /// Hold a registry slot for the life of the bridge; released at `Closed`.
    pub fn with_permit(mut self, permit: CallPermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn state(&self) -> BridgeState {
        self.session.state
    }

    pub fn buffered_frames(&self) -> usize {
        self.pending_outbound.len()
    }

    pub fn is_commit_timer_running(&self) -> bool {
        self.commit_timer.is_running()
    }

    /// Drive the call to completion and return the final session record.
    pub async fn run(
        mut self,
        call_inbound: BoxStream<'static, LegInbound>,
        dialer: Arc<dyn AiDialer>,
    ) -> CallSession {
        let Some(mut events) = self.events_rx.take() else {
            warn!(call_id = %self.session.id, "Bridge already ran");
            return self.session.clone();
        };

        info!(
            call_id = %self.session.id,
            call_encoding = %self.session.call_encoding,
            ai_format = self.config.ai_format.as_str(),
            "Call leg accepted, dialing AI leg"
        );

        self.call_pump = Some(tokio::spawn(pump(
            call_inbound,
            self.events_tx.clone(),
            BridgeEvent::CallLeg,
        )));
        self.spawn_dial(dialer);

        let max_deadline = deadline_after(self.session.started_at, self.config.max_call_duration);

        while self.session.state != BridgeState::Closed {
            let closing = self.session.state.is_closing();
            let grace_deadline = self.close_deadline.unwrap_or(max_deadline);

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    // Unreachable while the bridge holds a sender
                    None => break,
                },
                _ = sleep_until(max_deadline), if !closing => {
                    warn!(call_id = %self.session.id, "Maximum call duration elapsed");
                    self.begin_close(CloseReason::MaxDurationElapsed).await;
                }
                _ = sleep_until(grace_deadline), if self.close_deadline.is_some() => {
                    warn!(
                        call_id = %self.session.id,
                        call_leg_closed = self.call_leg_done,
                        ai_leg_closed = self.ai_leg_done,
                        "Close grace period elapsed"
                    );
                    self.finish();
                }
            }
        }

        self.finish();
        self.session.clone()
    }

    /// Apply one event. Exposed so the state machine can be driven directly.
    pub async fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::CallLeg(item) => self.on_call_leg(item).await,
            BridgeEvent::AiOpened(sink) => self.on_ai_opened(sink).await,
            BridgeEvent::AiDialFailed(reason) => self.on_ai_dial_failed(reason).await,
            BridgeEvent::AiLeg(item) => self.on_ai_leg(item).await,
            BridgeEvent::CommitTick => self.on_commit_tick().await,
        }

        if self.session.state == BridgeState::Closing && self.call_leg_done && self.ai_leg_done {
            self.finish();
        }
    }

    // =========================================================================
    // AI leg lifecycle
    // =========================================================================

    fn spawn_dial(&mut self, dialer: Arc<dyn AiDialer>) {
        let events = self.events_tx.clone();
        let retry = self.config.dial_retry.clone();
        let connect_timeout = self.config.ai_connect_timeout;
        let call_id = self.session.id;

        self.dial_task = Some(tokio::spawn(async move {
            match dial_with_retry(dialer.as_ref(), &retry, connect_timeout, call_id).await {
                Ok(AiConnection { sink, inbound }) => {
                    if events.send(BridgeEvent::AiOpened(sink)).await.is_err() {
                        return;
                    }
                    pump(inbound, events, BridgeEvent::AiLeg).await;
                }
                Err(e) => {
                    let _ = events.send(BridgeEvent::AiDialFailed(e.to_string())).await;
                }
            }
        }));
    }

    async fn on_ai_opened(&mut self, mut sink: Box<dyn LegSink>) {
        if self.session.state.is_closing() || self.ai_leg.is_some() {
            debug!(call_id = %self.session.id, "AI leg opened after teardown, closing it");
            sink.close().await;
            return;
        }

        self.ai_leg = Some(sink);
        self.transition(BridgeState::Buffering);

        match self.configure_ai_leg().await {
            Ok(drained) => {
                self.session.ai_ready = true;
                self.commit_timer.start(self.config.commit_interval);
                self.transition(BridgeState::Active);
                info!(
                    call_id = %self.session.id,
                    drained_frames = drained,
                    dropped_frames = self.pending_outbound.dropped(),
                    "AI leg ready"
                );
            }
            Err(e) => {
                error!(call_id = %self.session.id, error = %e, "Failed to configure AI leg");
                self.begin_close(CloseReason::AiLegError(e.to_string())).await;
            }
        }
    }

    /// Send `session.update`, then every frame buffered so far.
    async fn configure_ai_leg(&mut self) -> BridgeResult<usize> {
        let update = ClientEvent::SessionUpdate {
            session: self.config.session.clone(),
        }
        .to_json()?;

        let Some(leg) = self.ai_leg.as_mut() else {
            return Err(LegError::Closed.into());
        };
        leg.send_text(update).await?;
        Ok(self.pending_outbound.drain_to(leg.as_mut()).await?)
    }

    async fn on_ai_dial_failed(&mut self, reason: String) {
        self.dial_task = None;
        if self.session.state.is_closing() {
            return;
        }

        match self.config.dial_failure {
            AiDialFailurePolicy::Wait => {
                error!(
                    call_id = %self.session.id,
                    error = %reason,
                    "AI leg unavailable, holding call leg open"
                );
            }
            AiDialFailurePolicy::HangUp => {
                error!(
                    call_id = %self.session.id,
                    error = %reason,
                    "AI leg unavailable, hanging up"
                );
                self.begin_close(CloseReason::AiDialFailed(reason)).await;
            }
        }
    }

    async fn on_ai_leg(&mut self, item: LegInbound) {
        match item {
            LegInbound::Text(text) => {
                if self.session.state.is_closing() {
                    return;
                }
                if let Err(e) = self.handle_ai_frame(&text).await {
                    if e.is_frame_local() {
                        self.count_dropped(&e);
                        warn!(call_id = %self.session.id, error = %e, "Dropped AI leg frame");
                    } else {
                        error!(call_id = %self.session.id, error = %e, "Call leg send failed");
                        self.begin_close(CloseReason::CallLegError(e.to_string())).await;
                    }
                }
            }
            LegInbound::Binary(data) => {
                self.session.stats.malformed_frames += 1;
                debug!(
                    call_id = %self.session.id,
                    len = data.len(),
                    "Ignoring binary AI leg frame"
                );
            }
            LegInbound::Closed => {
                self.ai_leg_done = true;
                info!(call_id = %self.session.id, "AI leg closed");
                self.begin_close(CloseReason::AiLegClosed).await;
            }
            LegInbound::Error(e) => {
                self.ai_leg_done = true;
                error!(call_id = %self.session.id, error = %e, "AI leg failed");
                self.begin_close(CloseReason::AiLegError(e)).await;
            }
        }
    }

    async fn handle_ai_frame(&mut self, text: &str) -> BridgeResult<()> {
        let event: ServerEvent = serde_json::from_str(text)
            .map_err(|e| BridgeError::MalformedFrame(e.to_string()))?;

        match event {
            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                debug!(
                    call_id = %self.session.id,
                    ai_session = session.as_ref().map(|s| s.id.as_str()).unwrap_or_default(),
                    "AI session configured"
                );
            }
            ServerEvent::AudioDelta { delta, .. } => {
                self.session.response_audio_frames += 1;
                if !self.call_leg.as_ref().is_some_and(|leg| leg.is_open()) {
                    debug!(call_id = %self.session.id, "Call leg gone, dropping AI audio");
                    return Ok(());
                }

                let raw = ServerEvent::decode_audio_delta(&delta)?;
                let converted = self.transducer.encode_outbound(&raw)?;
                let frame = CallLegOutbound::media(
                    self.session.stream_sid.clone(),
                    BASE64_STANDARD.encode(&converted),
                )
                .to_json()?;
                self.send_to_call(frame).await?;
                self.session.stats.frames_out += 1;
            }
            ServerEvent::TextDelta { delta, .. } => {
                debug!(call_id = %self.session.id, text = %delta, "AI text delta");
            }
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                debug!(call_id = %self.session.id, transcript = %delta, "AI transcript delta");
            }
            ServerEvent::ResponseDone { response } => {
                self.session.stats.responses_completed += 1;
                let audio_frames = std::mem::take(&mut self.session.response_audio_frames);
                if audio_frames == 0 {
                    warn!(
                        call_id = %self.session.id,
                        status = response.as_ref().map(|r| r.status.as_str()).unwrap_or_default(),
                        "AI response completed without audio"
                    );
                }

                let mark =
                    CallLegOutbound::response_done(self.session.stream_sid.clone()).to_json()?;
                self.send_to_call(mark).await?;
            }
            ServerEvent::Error { error } => {
                warn!(
                    call_id = %self.session.id,
                    error_type = %error.error_type,
                    code = error.code.as_deref().unwrap_or_default(),
                    "AI leg reported error: {}",
                    error.message
                );
            }
            ServerEvent::Unknown => {}
        }
        Ok(())
    }

    // =========================================================================
    // Call leg
    // =========================================================================

    async fn on_call_leg(&mut self, item: LegInbound) {
        match item {
            LegInbound::Text(text) => {
                if self.session.state.is_closing() {
                    return;
                }
                if let Err(e) = self.handle_call_frame(&text).await {
                    if e.is_frame_local() {
                        self.count_dropped(&e);
                        warn!(call_id = %self.session.id, error = %e, "Dropped call leg frame");
                    } else {
                        error!(call_id = %self.session.id, error = %e, "AI leg send failed");
                        self.begin_close(CloseReason::AiLegError(e.to_string())).await;
                    }
                }
            }
            LegInbound::Binary(data) => {
                self.session.stats.malformed_frames += 1;
                warn!(
                    call_id = %self.session.id,
                    len = data.len(),
                    "Dropped binary call leg frame"
                );
            }
            LegInbound::Closed => {
                self.call_leg_done = true;
                info!(call_id = %self.session.id, "Call leg closed");
                self.begin_close(CloseReason::CallLegClosed).await;
            }
            LegInbound::Error(e) => {
                self.call_leg_done = true;
                error!(call_id = %self.session.id, error = %e, "Call leg failed");
                self.begin_close(CloseReason::CallLegError(e)).await;
            }
        }
    }

    async fn handle_call_frame(&mut self, text: &str) -> BridgeResult<()> {
        let event =
            CallLegEvent::parse(text).map_err(|e| BridgeError::MalformedFrame(e.to_string()))?;

        match event {
            CallLegEvent::Connected { protocol } => {
                debug!(call_id = %self.session.id, protocol = ?protocol, "Call leg connected");
            }
            CallLegEvent::Start { stream_sid, start } => self.on_start(stream_sid, start),
            CallLegEvent::Media { media, .. } => self.on_media(media).await?,
            CallLegEvent::Mark { mark } => {
                debug!(
                    call_id = %self.session.id,
                    mark = mark.as_ref().map(|m| m.name.as_str()).unwrap_or_default(),
                    "Call leg played mark"
                );
            }
            CallLegEvent::Stop { .. } => self.on_stop().await,
            CallLegEvent::Unknown => {
                debug!(call_id = %self.session.id, "Ignoring call leg event");
            }
        }
        Ok(())
    }

    fn on_start(&mut self, stream_sid: Option<String>, start: Option<StartMetadata>) {
        let start = start.unwrap_or_default();
        let stream_sid = stream_sid.or(start.stream_sid);

        self.session.stream_sid = stream_sid;
        self.session.call_sid = start.call_sid;

        let declared = start.media_format.and_then(|format| format.encoding);
        if let Some(declared) = declared {
            match CallAudioEncoding::parse(&declared) {
                Some(encoding) if self.session.encoding_locked => {
                    if encoding != self.session.call_encoding {
                        warn!(
                            call_id = %self.session.id,
                            declared = %encoding,
                            "Start frame arrived after audio, keeping {}",
                            self.session.call_encoding
                        );
                    }
                }
                Some(encoding) => {
                    self.session.call_encoding = encoding;
                    self.transducer = AudioTransducer::new(encoding, self.config.ai_format);
                }
                None => {
                    warn!(
                        call_id = %self.session.id,
                        declared = %declared,
                        "Unsupported call leg encoding, keeping {}",
                        self.session.call_encoding
                    );
                }
            }
        }

        info!(
            call_id = %self.session.id,
            stream_sid = self.session.stream_sid.as_deref().unwrap_or_default(),
            call_sid = self.session.call_sid.as_deref().unwrap_or_default(),
            encoding = %self.session.call_encoding,
            "Media stream started"
        );
    }

    async fn on_media(&mut self, media: MediaPayload) -> BridgeResult<()> {
        if media.is_outbound_track() {
            return Ok(());
        }

        self.session.encoding_locked = true;
        self.session.stats.frames_in += 1;

        let raw = BASE64_STANDARD.decode(media.payload.as_bytes())?;
        let converted = self.transducer.decode_inbound(&raw)?;
        let frame = ClientEvent::audio_append(&converted).to_json()?;
        let duration = Duration::from_millis(self.transducer.call_duration_ms(raw.len()));

        if self.pending_outbound.is_ready() {
            self.send_to_ai(frame).await?;
        } else {
            match self.pending_outbound.push(frame) {
                PushOutcome::Buffered | PushOutcome::AlreadyDrained => {}
                PushOutcome::DroppedOldest => {
                    self.session.stats.dropped_frames += 1;
                    debug!(
                        call_id = %self.session.id,
                        "Readiness buffer full, dropped oldest frame"
                    );
                }
                PushOutcome::Overflow => {
                    self.session.stats.dropped_frames += 1;
                    warn!(
                        call_id = %self.session.id,
                        capacity = self.config.buffer_capacity,
                        "Readiness buffer overflow"
                    );
                    self.begin_close(CloseReason::BufferOverflow).await;
                    return Ok(());
                }
            }
        }

        self.session.audio_since_commit += duration;
        Ok(())
    }

    async fn on_stop(&mut self) {
        info!(call_id = %self.session.id, "Call leg sent stop");
        if self.session.ai_ready
            && !self.session.state.is_closing()
            && let Err(e) = self.commit_turn().await
        {
            warn!(call_id = %self.session.id, error = %e, "Final commit failed");
        }
        self.begin_close(CloseReason::CallStopped).await;
    }

    // =========================================================================
    // Turn taking
    // =========================================================================

    async fn on_commit_tick(&mut self) {
        if !self.session.ai_ready || self.session.state.is_closing() {
            return;
        }
        if !self
            .turn_policy
            .should_commit_now(self.session.audio_since_commit)
        {
            debug!(
                call_id = %self.session.id,
                audio_ms = self.session.audio_since_commit.as_millis() as u64,
                "Skipping commit"
            );
            return;
        }

        if let Err(e) = self.commit_turn().await {
            error!(call_id = %self.session.id, error = %e, "Commit failed");
            self.begin_close(CloseReason::AiLegError(e.to_string())).await;
        }
    }

    /// Commit the appended audio and ask for a response.
    async fn commit_turn(&mut self) -> BridgeResult<()> {
        let commit = ClientEvent::InputAudioBufferCommit.to_json()?;
        let respond = ClientEvent::response_create(&self.config.response).to_json()?;

        self.send_to_ai(commit).await?;
        self.send_to_ai(respond).await?;

        debug!(
            call_id = %self.session.id,
            audio_ms = self.session.audio_since_commit.as_millis() as u64,
            "Committed turn"
        );
        self.session.stats.commits_sent += 1;
        self.session.audio_since_commit = Duration::ZERO;
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Start closing. Later calls are no-ops.
    async fn begin_close(&mut self, reason: CloseReason) {
        if self.session.state.is_closing() {
            return;
        }

        info!(
            call_id = %self.session.id,
            state = %self.session.state,
            reason = %reason,
            "Closing bridge"
        );
        self.transition(BridgeState::Closing);
        self.session.close_reason = Some(reason);
        self.commit_timer.stop();

        let discarded = self.pending_outbound.discard();
        if discarded > 0 {
            self.session.stats.dropped_frames += discarded as u64;
            debug!(call_id = %self.session.id, discarded, "Discarded buffered frames");
        }

        if let Some(mut leg) = self.ai_leg.take() {
            leg.close().await;
        } else {
            // Never opened; stop dialing and count the leg as closed
            if let Some(task) = self.dial_task.take() {
                task.abort();
            }
            self.ai_leg_done = true;
        }

        if let Some(mut leg) = self.call_leg.take() {
            leg.close().await;
        }

        self.close_deadline = Some(deadline_after(Instant::now(), self.config.close_grace));
    }

    fn finish(&mut self) {
        if self.session.state == BridgeState::Closed {
            return;
        }
        self.transition(BridgeState::Closed);
        self.commit_timer.stop();
        self.close_deadline = None;

        for task in [self.call_pump.take(), self.dial_task.take()].into_iter().flatten() {
            task.abort();
        }

        let stats = self.session.stats;
        let reason = self
            .session
            .close_reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(
            call_id = %self.session.id,
            reason = %reason,
            duration_ms = self.session.elapsed().as_millis() as u64,
            frames_in = stats.frames_in,
            frames_out = stats.frames_out,
            dropped_frames = stats.dropped_frames,
            malformed_frames = stats.malformed_frames,
            commits_sent = stats.commits_sent,
            "Bridge closed"
        );

        // Releases the registry slot
        self.permit = None;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn transition(&mut self, next: BridgeState) {
        if self.session.advance(next) {
            debug!(call_id = %self.session.id, state = %next, "Bridge state changed");
        }
    }

    fn count_dropped(&mut self, error: &BridgeError) {
        match error {
            BridgeError::MalformedFrame(_) | BridgeError::Serialization(_) => {
                self.session.stats.malformed_frames += 1;
            }
            _ => self.session.stats.dropped_frames += 1,
        }
    }

    async fn send_to_ai(&mut self, frame: String) -> Result<(), LegError> {
        match self.ai_leg.as_mut() {
            Some(leg) => leg.send_text(frame).await,
            None => Err(LegError::Closed),
        }
    }

    async fn send_to_call(&mut self, frame: String) -> Result<(), LegError> {
        match self.call_leg.as_mut() {
            Some(leg) => leg.send_text(frame).await,
            None => Err(LegError::Closed),
        }
    }
}

/// Dial the AI leg, retrying per `retry`. Each attempt is bounded by
/// `connect_timeout`.
async fn dial_with_retry(
    dialer: &dyn AiDialer,
    retry: &DialRetryConfig,
    connect_timeout: Duration,
    call_id: Uuid,
) -> RealtimeResult<AiConnection> {
    let mut failed = 0;
    loop {
        let result = match timeout(connect_timeout, dialer.dial()).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::Timeout(format!(
                "AI leg not open after {}ms",
                connect_timeout.as_millis()
            ))),
        };

        match result {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                failed += 1;
                let retryable = !matches!(
                    e,
                    RealtimeError::AuthenticationFailed(_) | RealtimeError::InvalidConfiguration(_)
                );
                if !retryable || !retry.should_retry(failed) {
                    return Err(e);
                }

                let delay = retry.calculate_delay(failed);
                warn!(
                    call_id = %call_id,
                    attempt = failed,
                    delay_ms = delay,
                    error = %e,
                    "AI dial failed, retrying"
                );
                sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}
