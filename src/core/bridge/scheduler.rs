//! Commit cadence for a bridge.
//!
//! There is no voice activity detection on the AI leg, so turns are cut on a
//! timer: every tick the bridge commits the audio appended so far and asks
//! for a response. An utterance is answered at most one interval after it
//! has been fully spoken.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Roughly thirty years; a deadline this far out never fires.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `base + after`, pushed out to a deadline that never fires instead of
/// panicking on overflow.
pub(crate) fn deadline_after(base: Instant, after: Duration) -> Instant {
    base.checked_add(after)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Decides, per tick, whether the bridge commits.
pub trait TurnPolicy: Send + Sync + std::fmt::Debug {
    fn should_commit_now(&self, audio_since_commit: Duration) -> bool;
}

/// Commit on every tick, audio or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCadence;

impl TurnPolicy for FixedCadence {
    fn should_commit_now(&self, _audio_since_commit: Duration) -> bool {
        true
    }
}

/// Commit only once at least this much audio has been appended.
#[derive(Debug, Clone, Copy)]
pub struct MinimumAudio(pub Duration);

impl TurnPolicy for MinimumAudio {
    fn should_commit_now(&self, audio_since_commit: Duration) -> bool {
        audio_since_commit >= self.0
    }
}

/// Policy for a configured minimum; zero selects [`FixedCadence`].
pub fn turn_policy_for(min_audio: Duration) -> Box<dyn TurnPolicy> {
    if min_audio.is_zero() {
        Box::new(FixedCadence)
    } else {
        Box::new(MinimumAudio(min_audio))
    }
}

/// Owns at most one recurring timer. Each tick posts `tick()` into the
/// bridge's event queue.
pub struct CommitScheduler<T> {
    events: mpsc::Sender<T>,
    tick: fn() -> T,
    timer: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> CommitScheduler<T> {
    pub fn new(events: mpsc::Sender<T>, tick: fn() -> T) -> Self {
        Self {
            events,
            tick,
            timer: None,
        }
    }

    /// Arm the timer; the first tick fires one `interval` from now.
    ///
    /// Returns `false` without touching the running timer if one is armed.
    pub fn start(&mut self, interval: Duration) -> bool {
        if self.is_running() {
            return false;
        }

        let events = self.events.clone();
        let tick = self.tick;
        let first = deadline_after(Instant::now(), interval);
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(tick()).await.is_err() {
                    break;
                }
            }
        }));
        true
    }

    /// Cancel the timer. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl<T> Drop for CommitScheduler<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
