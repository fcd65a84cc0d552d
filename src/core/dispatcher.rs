//! Engine state machine and dispatch loop
//!
//! The dispatcher is one long-lived task that paces and launches requests:
//! read the current parameter snapshot, resize the limiter if the
//! concurrency cap moved, sample a coordinate, build a payload, block on a
//! limiter slot (backpressure), spawn a request task, then sleep
//! `1 / rate_hz` before the next iteration. Every ~200 ms it refreshes the
//! cumulative average rate.
//!
//! Run-state transitions: `Idle → Running ⇄ Paused → Stopped`, with Stopped
//! terminal. Pause parks the dispatcher on a watch channel (no busy
//! polling, no missed toggles) and has no effect on tasks already in
//! flight. Stop halts dispatch and then waits for
//! outstanding request tasks to drain, bounded by the per-request timeout
//! plus slack; it never cancels an in-flight network call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};

use super::executor::RequestExecutor;
use super::limiter::ConcurrencyLimiter;
use super::params::{ParamUpdate, Parameters, SharedParameters};
use super::payload::{build_payload, epoch_millis_now, sample_coordinate};
use super::stats::{StatsAggregator, StatsSnapshot};

/// How often the dispatcher refreshes the cumulative average rate.
const RATE_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Extra drain time granted on Stop beyond the per-request timeout.
const STOP_DRAIN_SLACK: Duration = Duration::from_millis(500);

/// Engine run state, readable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built but not started
    Idle,
    /// Dispatching requests
    Running,
    /// Dispatch suspended; in-flight requests keep running
    Paused,
    /// Terminal; a new run requires a new engine instance
    Stopped,
}

/// One Start-to-Stop load generation run.
///
/// The engine owns the dispatcher task and everything it shares with the
/// request tasks. All methods take `&self`; the engine is meant to live in
/// an `Arc` shared between the driving side and any snapshot readers.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    params: Arc<SharedParameters>,
    stats: Arc<StatsAggregator>,
    limiter: Arc<ConcurrencyLimiter>,
    executor: Arc<RequestExecutor>,
    state_tx: watch::Sender<EngineState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Validate the configuration and build an idle engine with fresh stats.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let executor = RequestExecutor::new(&config)?;
        let initial = config.initial.clamped();
        let (state_tx, _) = watch::channel(EngineState::Idle);

        Ok(Self {
            params: Arc::new(SharedParameters::new(initial)),
            stats: Arc::new(StatsAggregator::new()),
            limiter: Arc::new(ConcurrencyLimiter::new(initial.concurrency)),
            executor: Arc::new(executor),
            state_tx,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            dispatcher: Mutex::new(None),
            config,
        })
    }

    /// Start the run: `Idle → Running`, spawning the dispatcher task.
    pub fn start(&self) -> EngineResult<()> {
        let mut dispatcher = self.dispatcher.lock();
        // Check and transition in one closure so a concurrent stop() can
        // never be overwritten back to Running.
        let mut observed = EngineState::Idle;
        self.state_tx.send_if_modified(|state| {
            observed = *state;
            if *state == EngineState::Idle {
                *state = EngineState::Running;
                true
            } else {
                false
            }
        });
        match observed {
            EngineState::Idle => {}
            EngineState::Stopped => return Err(EngineError::Stopped),
            EngineState::Running | EngineState::Paused => return Err(EngineError::AlreadyStarted),
        }

        let ctx = DispatcherContext {
            params: self.params.clone(),
            stats: self.stats.clone(),
            limiter: self.limiter.clone(),
            executor: self.executor.clone(),
            tracker: self.tracker.clone(),
            cancel: self.cancel.clone(),
            state_rx: self.state_tx.subscribe(),
            max_coord: self.config.max_coord,
        };

        let initial = ctx.params.snapshot();
        info!(
            endpoint = format!("{}:{}", self.config.host, self.config.port),
            concurrency = initial.concurrency,
            rate_hz = initial.rate_hz,
            "starting dispatch loop"
        );
        *dispatcher = Some(tokio::spawn(run_dispatcher(ctx)));
        Ok(())
    }

    /// Toggle between Running and Paused. No-op in Idle or Stopped.
    pub fn toggle_pause(&self) {
        self.state_tx.send_if_modified(|state| match *state {
            EngineState::Running => {
                *state = EngineState::Paused;
                info!("dispatch paused");
                true
            }
            EngineState::Paused => {
                *state = EngineState::Running;
                info!("dispatch resumed");
                true
            }
            EngineState::Idle | EngineState::Stopped => false,
        });
    }

    /// Stop the run and wait for in-flight requests to drain.
    ///
    /// Dispatch halts immediately; outstanding request tasks are never
    /// cancelled but are awaited for at most the per-request timeout plus
    /// slack, after which they are abandoned with a warning. Idempotent.
    pub async fn stop(&self) {
        self.state_tx.send_replace(EngineState::Stopped);
        self.cancel.cancel();

        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("dispatcher task join failed: {err}");
            }
        }

        self.tracker.close();
        let drain = self.config.request_timeout + STOP_DRAIN_SLACK;
        if tokio::time::timeout(drain, self.tracker.wait()).await.is_err() {
            warn!(
                "in-flight requests did not drain within {:?} after stop",
                drain
            );
        } else {
            info!("engine stopped, all request tasks drained");
        }
    }

    /// Apply one clamped parameter update; takes effect on the next
    /// dispatcher iteration.
    pub fn set_parameter(&self, update: ParamUpdate) {
        self.params.update(update);
    }

    /// Latest published parameter values.
    pub fn parameters(&self) -> Parameters {
        self.params.snapshot()
    }

    /// Read-only statistics snapshot, safe at any time.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }
}

impl Drop for Engine {
    /// The dispatcher task holds its own clones of everything it needs, so
    /// it would outlive an engine dropped without `stop()`. Cancelling here
    /// makes the loop exit at its next suspension point; in-flight requests
    /// still run to completion bounded by their timeout.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Everything the dispatcher task shares with the engine and its request
/// tasks.
struct DispatcherContext {
    params: Arc<SharedParameters>,
    stats: Arc<StatsAggregator>,
    limiter: Arc<ConcurrencyLimiter>,
    executor: Arc<RequestExecutor>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    state_rx: watch::Receiver<EngineState>,
    max_coord: u32,
}

async fn run_dispatcher(mut ctx: DispatcherContext) {
    let run_start = Instant::now();
    let mut last_rate_refresh = run_start;

    loop {
        // Park while paused; returns false once the run is over.
        if !wait_until_running(&mut ctx.state_rx, &ctx.cancel).await {
            break;
        }

        if ctx.cancel.is_cancelled() {
            break;
        }

        let params = ctx.params.snapshot();

        if ctx.limiter.capacity() != params.concurrency {
            debug!(
                from = ctx.limiter.capacity(),
                to = params.concurrency,
                "resizing concurrency limiter"
            );
            ctx.limiter.resize(params.concurrency);
        }

        let coord = sample_coordinate(ctx.max_coord);
        let payload = build_payload(epoch_millis_now(), coord, ctx.max_coord, &params);

        // Backpressure: at capacity this blocks until a request task
        // releases its slot.
        let permit = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            permit = ctx.limiter.acquire() => permit,
        };

        let executor = ctx.executor.clone();
        let stats = ctx.stats.clone();
        ctx.tracker.spawn(async move {
            let outcome = executor.execute(coord, &payload).await;
            stats.record(&outcome);
            drop(permit);
        });

        // Pacing: bounds the average dispatch rate, not task completion.
        let interval = Duration::from_secs_f64(1.0 / params.rate_hz);
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }

        if last_rate_refresh.elapsed() >= RATE_SAMPLE_INTERVAL {
            ctx.stats.refresh_rate(run_start.elapsed());
            last_rate_refresh = Instant::now();
        }
    }

    // Final refresh so a short run still reports a meaningful rate.
    ctx.stats.refresh_rate(run_start.elapsed());
    debug!("dispatch loop exited");
}

/// Block while the engine is paused. Returns `true` to dispatch, `false`
/// once the run is stopped or the engine was dropped.
async fn wait_until_running(
    state_rx: &mut watch::Receiver<EngineState>,
    cancel: &CancellationToken,
) -> bool {
    loop {
        match *state_rx.borrow_and_update() {
            EngineState::Running => return true,
            EngineState::Stopped => return false,
            EngineState::Idle | EngineState::Paused => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_engine() -> Engine {
        Engine::new(EngineConfig::default()).expect("default config builds")
    }

    #[tokio::test]
    async fn start_moves_idle_to_running_exactly_once() {
        let engine = idle_engine();
        assert_eq!(engine.state(), EngineState::Idle);

        engine.start().expect("first start");
        assert_eq!(engine.state(), EngineState::Running);
        assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));

        engine.stop().await;
    }

    #[tokio::test]
    async fn stop_is_terminal() {
        let engine = idle_engine();
        engine.start().expect("start");
        engine.stop().await;

        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(matches!(engine.start(), Err(EngineError::Stopped)));

        // Idempotent.
        engine.stop().await;
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn start_never_resurrects_a_stopped_state() {
        let engine = idle_engine();
        engine.start().expect("start");
        engine.stop().await;

        assert!(matches!(engine.start(), Err(EngineError::Stopped)));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn pause_toggle_flips_between_running_and_paused() {
        let engine = idle_engine();

        // No-op before start.
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Idle);

        engine.start().expect("start");
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Paused);
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Running);

        engine.stop().await;
        // No-op after stop.
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn parameter_updates_are_clamped_and_visible() {
        let engine = idle_engine();
        engine.set_parameter(ParamUpdate::RateHz(1.0e9));
        assert_eq!(
            engine.parameters().rate_hz,
            super::super::params::bounds::RATE_HZ_MAX
        );
    }

    #[test]
    fn invalid_config_never_builds_an_engine() {
        let mut config = EngineConfig::default();
        config.initial.rate_hz = -1.0;
        assert!(Engine::new(config).is_err());
    }
}
