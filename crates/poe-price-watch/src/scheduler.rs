//! Per-target poll timers that push fetched prices to a presence sink.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::ScrapeError;
use crate::pipeline::PricePipeline;
use crate::types::Target;

/// Time between two fetch cycles of the same target.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(180);

/// Where a fetched price ends up, e.g. a bot's "Watching …" status.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> String;

    /// Replace the displayed activity with `text`.
    async fn set_watching(&self, text: &str) -> anyhow::Result<()>;
}

/// How a single poll tick ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Price fetched and pushed to the sink.
    Updated(String),
    /// Fetch failed; the previous status stays in place.
    Skipped(ScrapeError),
    /// Price fetched but the sink refused it.
    PresenceFailed { price: String, error: String },
}

impl CycleOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, CycleOutcome::Updated(_))
    }
}

/// Fetch the price for `target` and, on success, publish it.
pub async fn run_cycle(
    pipeline: &PricePipeline,
    target: &Target,
    presence: &dyn PresenceSink,
) -> CycleOutcome {
    let name = presence.name();
    tracing::info!("[{name}] Starting status update for {}", target.label);

    let price = match pipeline.fetch_price(target).await {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!("[{name}] Failed to fetch price data ({e}). Status not updated.");
            return CycleOutcome::Skipped(e);
        }
    };

    match presence.set_watching(&price).await {
        Ok(()) => {
            tracing::info!("[{name}] Status updated successfully to: '{price}'");
            CycleOutcome::Updated(price)
        }
        Err(e) => {
            tracing::warn!("[{name}] Presence update failed: {e}");
            CycleOutcome::PresenceFailed {
                price,
                error: e.to_string(),
            }
        }
    }
}

struct RunningPoll {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// A restartable fixed-period timer for one (bot, target) pair.
///
/// The first cycle runs immediately on `start`. Ticks that would overlap a
/// slow cycle are delayed, never stacked.
pub struct PricePoller {
    target: Target,
    pipeline: PricePipeline,
    presence: Arc<dyn PresenceSink>,
    period: Duration,
    running: Mutex<Option<RunningPoll>>,
}

impl PricePoller {
    pub fn new(target: Target, pipeline: PricePipeline, presence: Arc<dyn PresenceSink>) -> Self {
        Self {
            target,
            pipeline,
            presence,
            period: DEFAULT_POLL_PERIOD,
            running: Mutex::new(None),
        }
    }

    /// Set the tick period. A zero period keeps the default.
    pub fn with_period(mut self, period: Duration) -> Self {
        if period.is_zero() {
            tracing::warn!(
                "[{}] zero poll period ignored, using {}s",
                self.target.label,
                DEFAULT_POLL_PERIOD.as_secs()
            );
            return self;
        }
        self.period = period;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        let guard = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the timer task. Returns `false` and does nothing if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut guard = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("[{}] poller already running", self.target.label);
            return false;
        }

        let stop = Arc::new(Notify::new());
        let stop_rx = Arc::clone(&stop);
        let target = self.target.clone();
        let pipeline = self.pipeline.clone();
        let presence = Arc::clone(&self.presence);
        let period = self.period;

        let handle = tokio::spawn(async move {
            tracing::info!(
                "[{}] poller started: every {}s for {}",
                presence.name(),
                period.as_secs(),
                target
            );
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.notified() => {
                        tracing::info!("[{}] poller stopping", presence.name());
                        break;
                    }
                    _ = ticker.tick() => {
                        run_cycle(&pipeline, &target, presence.as_ref()).await;
                    }
                }
            }
        });

        *guard = Some(RunningPoll { stop, handle });
        true
    }

    /// Stop the timer and wait for an in-flight cycle to finish.
    ///
    /// Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let running = {
            let mut guard = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        match running {
            Some(r) => {
                r.stop.notify_one();
                if let Err(e) = r.handle.await {
                    tracing::warn!("[{}] poller task ended abnormally: {e}", self.target.label);
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        let guard = self.running.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = guard.take() {
            r.handle.abort();
        }
    }
}
