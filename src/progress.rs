//! Cosmetic OCR progress.
//!
//! The backend reports nothing while OCR runs, so the progress shown to the
//! user is an **approximation driven by a timer**, not by server signals:
//!
//! * every tick (2 s by default) the percentage grows by a fixed step (15)
//!   and never passes a ceiling (90) until the real response arrives;
//! * each tick shows the next message of [`STATUS_MESSAGES`], holding the
//!   last one once the list is exhausted;
//! * remaining time is estimated as `elapsed * (100 / pct) - elapsed`.
//!
//! When the OCR call returns, the reporter is finished: the timer task is
//! aborted and the callback snaps to 100 % or to the failure state. Dropping
//! a [`ProgressReporter`] without finishing it (early return, cancelled
//! future, panic) also aborts the timer and reports
//! [`ProgressOutcome::Cancelled`].
//!
//! Inject an [`Arc<dyn OcrProgressCallback>`] through
//! [`crate::controller::StageController::with_progress`] to render it.

use crate::config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

/// Status lines shown in order while OCR runs.
pub const STATUS_MESSAGES: [&str; 6] = [
    "Initialising OCR engine…",
    "Loading model files…",
    "Processing image…",
    "Recognising text…",
    "Analysing layout…",
    "Finishing up…",
];

/// One tick of the approximate progress display.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Displayed percentage, never above the configured ceiling.
    pub percent: u8,
    pub message: &'static str,
    pub elapsed: Duration,
    /// Approximate time left; zero means "almost done".
    pub remaining: Duration,
}

/// How the OCR operation ended, from the progress display's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Snap to 100 %.
    Completed,
    /// Show the failure state.
    Failed,
    /// The operation was abandoned without a result.
    Cancelled,
}

/// Receives progress events for a running OCR call.
///
/// Implementations must be `Send + Sync`: ticks arrive from a spawned task.
/// All methods have default no-op implementations.
pub trait OcrProgressCallback: Send + Sync {
    /// Called once when the OCR request is sent.
    fn on_start(&self) {}

    /// Called on every timer tick.
    fn on_tick(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Called exactly once when the reporter stops.
    fn on_finish(&self, outcome: ProgressOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't display progress.
pub struct NoopProgressCallback;

impl OcrProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn OcrProgressCallback>;

/// Remaining-time estimate `elapsed * (100 / pct) - elapsed`, floored at zero.
pub fn estimate_remaining(elapsed: Duration, percent: u8) -> Duration {
    if percent == 0 {
        return Duration::ZERO;
    }
    let elapsed_secs = elapsed.as_secs_f64();
    let total = elapsed_secs * (100.0 / f64::from(percent));
    Duration::from_secs_f64((total - elapsed_secs).max(0.0))
}

/// Pure state machine behind the timer; advanced once per tick.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    percent: u8,
    step: u8,
    ceiling: u8,
    next_message: usize,
}

impl ProgressEstimator {
    pub fn new(step: u8, ceiling: u8) -> Self {
        Self {
            percent: 0,
            step,
            ceiling,
            next_message: 0,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.progress_step, config.progress_ceiling)
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn tick(&mut self, elapsed: Duration) -> ProgressSnapshot {
        self.percent = self.percent.saturating_add(self.step).min(self.ceiling);
        let idx = self.next_message.min(STATUS_MESSAGES.len() - 1);
        if self.next_message < STATUS_MESSAGES.len() {
            self.next_message += 1;
        }
        ProgressSnapshot {
            percent: self.percent,
            message: STATUS_MESSAGES[idx],
            elapsed,
            remaining: estimate_remaining(elapsed, self.percent),
        }
    }
}

/// Owns the timer task for one OCR call.
pub struct ProgressReporter {
    task: Option<JoinHandle<()>>,
    callback: ProgressCallback,
}

impl ProgressReporter {
    /// Start ticking; the first tick fires one interval after the start.
    pub fn start(config: &ClientConfig, callback: ProgressCallback) -> Self {
        callback.on_start();
        let config = config.clone().with_usable_timers();
        let tick = config.progress_tick();
        let mut estimator = ProgressEstimator::from_config(&config);
        let cb = Arc::clone(&callback);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticks = IntervalStream::new(tokio::time::interval_at(started + tick, tick));
            while ticks.next().await.is_some() {
                let snapshot = estimator.tick(started.elapsed());
                cb.on_tick(&snapshot);
            }
        });

        Self {
            task: Some(task),
            callback,
        }
    }

    /// Stop the timer and report the real outcome.
    pub fn finish(mut self, outcome: ProgressOutcome) {
        self.stop(outcome);
    }

    fn stop(&mut self, outcome: ProgressOutcome) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.callback.on_finish(outcome);
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop(ProgressOutcome::Cancelled);
    }
}
