//! Live poller: emulates a push feed by re-running a batch on a timer.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──first tick──► Polling ──cancel() / drop──► Cancelled
//! ```
//!
//! Each tick runs the executor in [`ExecutionMode::Live`] on its own task, so
//! a slow tick never delays the next one and frames may arrive out of tick
//! order. A failing target only fails its slot in that tick's frame.
//!
//! Cancellation stops the timer at once. In-flight ticks are left to finish,
//! but the cancellation token is checked right before every emission and
//! again by [`LiveFeed`] when it is polled, so nothing is delivered after
//! [`LiveFeed::cancel`] returns.

use crate::executor::{QueryData, QueryExecutor, TargetOutcome};
use futures::Stream;
use lokiq_core::{DataQueryError, DisplayMode, ExecutionMode, RawQuery, TimeRange};
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Per-target result inside a [`Frame`].
pub type SlotResult = Result<QueryData, DataQueryError>;

/// The results of one tick (or of a one-shot historical run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// 1-based tick number.
    pub seq: u64,
    /// `slots[i]` belongs to target `i`; skipped targets hold empty data.
    pub slots: Vec<SlotResult>,
}

impl Frame {
    pub fn failures(&self) -> impl Iterator<Item = &DataQueryError> {
        self.slots.iter().filter_map(|s| s.as_ref().err())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Subscribed, first tick not yet fired.
    Idle,
    Polling,
    Cancelled,
}

/// Floor for the poll period; `tokio::time::interval` rejects zero.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A batch waiting to be polled.
pub struct LivePoller {
    executor: Arc<QueryExecutor>,
    targets: Arc<[RawQuery]>,
    range: TimeRange,
    interval_ms: u64,
    display: DisplayMode,
    period: Duration,
}

impl LivePoller {
    pub fn new(
        executor: Arc<QueryExecutor>,
        targets: Vec<RawQuery>,
        range: TimeRange,
        interval_ms: u64,
        display: DisplayMode,
        period: Duration,
    ) -> Self {
        Self {
            executor,
            targets: targets.into(),
            range,
            interval_ms,
            display,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Start polling. The first tick fires immediately.
    pub fn subscribe(self) -> LiveFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let started = Arc::new(AtomicBool::new(false));
        tracing::info!(
            targets = self.targets.len(),
            period_ms = self.period.as_millis() as u64,
            "live poller started"
        );
        tokio::spawn(self.run(tx, token.clone(), Arc::clone(&started)));
        LiveFeed { rx, token, started }
    }

    async fn run(
        self,
        tx: mpsc::UnboundedSender<Frame>,
        token: CancellationToken,
        started: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            seq += 1;
            started.store(true, Ordering::Release);

            let executor = Arc::clone(&self.executor);
            let targets = Arc::clone(&self.targets);
            let range = self.range.clone();
            let (interval_ms, display) = (self.interval_ms, self.display);
            let tx = tx.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let outcomes = executor
                    .execute_positional(&targets, &range, ExecutionMode::Live)
                    .await;
                let frame = Frame {
                    seq,
                    slots: slots_from_outcomes(&executor, outcomes, interval_ms, display),
                };
                for failure in frame.failures() {
                    tracing::warn!(seq, ref_id = ?failure.ref_id, error = %failure.message, "live tick target failed");
                }
                if token.is_cancelled() {
                    tracing::debug!(seq, "dropping tick resolved after cancellation");
                    return;
                }
                let _ = tx.send(frame);
            });
        }

        tracing::info!(ticks = seq, "live poller stopped");
    }
}

/// Run a batch once and deliver it as a single-frame feed.
pub fn one_shot(
    executor: Arc<QueryExecutor>,
    targets: Vec<RawQuery>,
    range: TimeRange,
    interval_ms: u64,
    display: DisplayMode,
) -> LiveFeed {
    let (tx, rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let guard = token.clone();
    let started = Arc::new(AtomicBool::new(true));
    tokio::spawn(async move {
        let outcomes = executor
            .execute_positional(&targets, &range, ExecutionMode::Historical)
            .await;
        let slots = slots_from_outcomes(&executor, outcomes, interval_ms, display);
        if !guard.is_cancelled() {
            let _ = tx.send(Frame { seq: 1, slots });
        }
    });
    LiveFeed { rx, token, started }
}

fn slots_from_outcomes(
    executor: &QueryExecutor,
    outcomes: Vec<TargetOutcome>,
    interval_ms: u64,
    display: DisplayMode,
) -> Vec<SlotResult> {
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            TargetOutcome::Skipped => Ok(QueryData::empty(display)),
            TargetOutcome::Streams(streams) => Ok(executor.shape(streams, interval_ms, display)),
            TargetOutcome::Failed(err) => Err(err.into()),
        })
        .collect()
}

/// Subscriber end of a poller. Dropping it cancels the poller.
pub struct LiveFeed {
    rx: mpsc::UnboundedReceiver<Frame>,
    token: CancellationToken,
    started: Arc<AtomicBool>,
}

impl LiveFeed {
    /// Stop polling. Frames still in flight are discarded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn state(&self) -> PollerState {
        if self.token.is_cancelled() {
            PollerState::Cancelled
        } else if self.started.load(Ordering::Acquire) {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    /// A token that cancels this feed, e.g. from a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Stream for LiveFeed {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
