//! View loops: lease, pull, fold, advance, sleep.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use warden_core::clock::{Clock, SystemClock};
use warden_core::error::DomainError;
use warden_core::lock::Locker;
use warden_core::projection::ProjectionHandler;
use warden_core::store::EventStore;
use warden_core::watermark::WatermarkStore;

use crate::config::SpoolerConfig;
use crate::status::{StatusBoard, ViewState};

/// Result of one pass through the loop.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Another instance holds the lease; nothing was read.
    LockHeld,
    /// Every available event was folded.
    CaughtUp {
        /// Events folded this cycle.
        processed: usize,
        /// Watermark after the cycle.
        watermark: i64,
    },
    /// The batch stopped early. The watermark sits on the last success.
    Halted {
        /// Events folded before the halt.
        processed: usize,
        /// Watermark after the cycle.
        watermark: i64,
        /// Why the batch stopped.
        error: DomainError,
    },
}

struct Shared {
    config: SpoolerConfig,
    store: Arc<dyn EventStore>,
    locker: Arc<dyn Locker>,
    watermarks: Arc<dyn WatermarkStore>,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
}

/// Schedules registered projection handlers.
pub struct Spooler {
    config: SpoolerConfig,
    store: Arc<dyn EventStore>,
    locker: Arc<dyn Locker>,
    watermarks: Arc<dyn WatermarkStore>,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
    handlers: Vec<Arc<dyn ProjectionHandler>>,
}

impl Spooler {
    /// Creates a spooler with no handlers.
    #[must_use]
    pub fn new(
        config: SpoolerConfig,
        store: Arc<dyn EventStore>,
        locker: Arc<dyn Locker>,
        watermarks: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            config,
            store,
            locker,
            watermarks,
            clock: Arc::new(SystemClock),
            status: StatusBoard::new(),
            handlers: Vec::new(),
        }
    }

    /// Replaces the clock used for status timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Adds a handler. Each handler gets its own loop once started.
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn ProjectionHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Status board the loops publish to.
    #[must_use]
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Spawns one loop per handler. Loops stop once `shutdown` reads `true`.
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> SpoolerHandle {
        let shared = Arc::new(Shared {
            config: self.config,
            store: self.store,
            locker: self.locker,
            watermarks: self.watermarks,
            clock: self.clock,
            status: self.status,
        });
        let mut tasks = Vec::with_capacity(self.handlers.len());
        let mut views = BTreeSet::new();

        for handler in self.handlers {
            let view = handler.view_model().to_owned();
            shared.status.register(&view).await;
            views.insert(view.clone());

            info!(view = %view, holder = %shared.config.holder_id, "starting view loop");
            let view_loop = ViewLoop::new(Arc::clone(&shared), handler);
            tasks.push(tokio::spawn(view_loop.run(shutdown.clone())));
        }

        SpoolerHandle {
            tasks,
            resets: ViewResets {
                views: Arc::new(views),
                watermarks: Arc::clone(&shared.watermarks),
            },
            status: shared.status.clone(),
        }
    }
}

impl std::fmt::Debug for Spooler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spooler")
            .field("holder_id", &self.config.holder_id)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// Files re-projection requests for the views a spooler runs.
#[derive(Clone)]
pub struct ViewResets {
    views: Arc<BTreeSet<String>>,
    watermarks: Arc<dyn WatermarkStore>,
}

impl ViewResets {
    /// Asks for `view_model` to be rebuilt from position 0.
    ///
    /// The request is persisted with the watermark. Whichever instance holds
    /// the view's lease clears the view and its watermark at the start of its
    /// next cycle, so filing it on a standby instance is enough.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no handler maintains `view_model`,
    /// and propagates watermark store errors.
    pub async fn reset_view(&self, view_model: &str) -> Result<(), DomainError> {
        if !self.views.contains(view_model) {
            return Err(DomainError::NotFound(format!("view {view_model}")));
        }
        self.watermarks.request_reset(view_model).await?;
        info!(view = %view_model, "re-projection requested");
        Ok(())
    }
}

impl std::fmt::Debug for ViewResets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewResets")
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

/// Running spooler: its tasks, status board and re-projection requests.
#[derive(Debug)]
pub struct SpoolerHandle {
    tasks: Vec<JoinHandle<()>>,
    resets: ViewResets,
    status: StatusBoard,
}

impl SpoolerHandle {
    /// Status board the loops publish to.
    #[must_use]
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Re-projection requests, for callers that outlive the borrow.
    #[must_use]
    pub fn resets(&self) -> ViewResets {
        self.resets.clone()
    }

    /// Shorthand for [`ViewResets::reset_view`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no handler maintains `view_model`,
    /// and propagates watermark store errors.
    pub async fn reset_view(&self, view_model: &str) -> Result<(), DomainError> {
        self.resets.reset_view(view_model).await
    }

    /// Waits for every loop to exit.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "view loop terminated abnormally");
            }
        }
    }
}

struct ViewLoop {
    shared: Arc<Shared>,
    handler: Arc<dyn ProjectionHandler>,
    watermark: i64,
    backoff: Option<Duration>,
}

impl ViewLoop {
    fn new(shared: Arc<Shared>, handler: Arc<dyn ProjectionHandler>) -> Self {
        Self {
            shared,
            handler,
            watermark: 0,
            backoff: None,
        }
    }

    fn view(&self) -> &str {
        self.handler.view_model()
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.cycle(&shutdown).await;
            self.publish(&outcome).await;
            let pause = self.pause_after(&outcome);

            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(view = %self.view(), "view loop stopped");
    }

    /// Runs one Idle → Locked → Processing → Releasing pass.
    #[instrument(skip_all, fields(view = %self.handler.view_model()))]
    async fn cycle(&mut self, shutdown: &watch::Receiver<bool>) -> CycleOutcome {
        let shared = Arc::clone(&self.shared);
        let config = &shared.config;
        let view = self.handler.view_model().to_owned();

        match shared
            .locker
            .renew(&config.holder_id, &view, config.lock_wait)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_lock_held() => {
                debug!("lease held elsewhere, standing by");
                return CycleOutcome::LockHeld;
            }
            Err(e) => return self.halt(0, e),
        }
        let mut renewed_at = Instant::now();

        // A failed rewind leaves the request in place for the next holder.
        match shared.watermarks.reset_requested(&view).await {
            Ok(true) => {
                if let Err(e) = self.rewind(&view).await {
                    return self.halt(0, e);
                }
            }
            Ok(false) => {}
            Err(e) => return self.halt(0, e),
        }

        self.watermark = match shared.watermarks.current(&view).await {
            Ok(position) => position,
            Err(e) => return self.halt(0, e),
        };

        let mut processed = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let filter = self
                .handler
                .event_query()
                .after(self.watermark)
                .limit(config.batch_size);
            let events = match shared.store.query(&filter).await {
                Ok(events) => events,
                Err(e) => return self.halt(processed, e),
            };
            let page_len = events.len();

            for event in events {
                if renewed_at.elapsed() >= config.heartbeat_interval() {
                    if let Err(e) = shared
                        .locker
                        .renew(&config.holder_id, &view, config.lock_wait)
                        .await
                    {
                        return self.halt(processed, e);
                    }
                    renewed_at = Instant::now();
                }

                if let Err(e) = self.handler.process(&event).await {
                    error!(
                        position = event.position,
                        event_type = %event.event_type,
                        error = %e,
                        "fold failed, halting batch"
                    );
                    return self.halt(processed, e);
                }
                if let Err(e) = shared.watermarks.advance(&view, event.position).await
                {
                    return self.halt(processed, e);
                }
                self.watermark = event.position;
                processed += 1;
            }

            if page_len < config.batch_size {
                break;
            }
        }

        if processed > 0 {
            debug!(processed, watermark = self.watermark, "batch folded");
        }
        CycleOutcome::CaughtUp {
            processed,
            watermark: self.watermark,
        }
    }

    async fn rewind(&mut self, view: &str) -> Result<(), DomainError> {
        self.handler.clear().await?;
        self.shared.watermarks.reset(view).await?;
        self.watermark = 0;
        info!("view cleared for re-projection");
        Ok(())
    }

    fn halt(&self, processed: usize, error: DomainError) -> CycleOutcome {
        if error.is_lock_held() {
            debug!("lease lost mid-batch");
        } else if error.is_transient() {
            warn!(error = %error, "transient failure, backing off");
        }
        CycleOutcome::Halted {
            processed,
            watermark: self.watermark,
            error,
        }
    }

    async fn publish(&self, outcome: &CycleOutcome) {
        let now = self.shared.clock.now();
        self.shared
            .status
            .update(self.view(), |status| {
                status.last_cycle_at = Some(now);
                match outcome {
                    CycleOutcome::LockHeld => {
                        status.state = ViewState::Standby;
                        status.processed_last_cycle = 0;
                    }
                    CycleOutcome::CaughtUp {
                        processed,
                        watermark,
                    } => {
                        status.state = ViewState::CaughtUp;
                        status.watermark = *watermark;
                        status.processed_last_cycle = *processed;
                        status.processed_total += *processed as u64;
                        status.last_error = None;
                    }
                    CycleOutcome::Halted {
                        processed,
                        watermark,
                        error,
                    } => {
                        status.state = if error.is_lock_held() {
                            ViewState::Standby
                        } else {
                            ViewState::Stalled
                        };
                        status.watermark = *watermark;
                        status.processed_last_cycle = *processed;
                        status.processed_total += *processed as u64;
                        status.last_error = Some(error.to_string());
                    }
                }
            })
            .await;
    }

    /// Sleep before the next cycle. Consecutive transient failures double the
    /// pause up to the configured ceiling; anything else resets it.
    fn pause_after(&mut self, outcome: &CycleOutcome) -> Duration {
        let cycle = self.handler.minimum_cycle_duration();
        match outcome {
            CycleOutcome::Halted { error, .. } if error.is_transient() => {
                let next = self
                    .backoff
                    .map_or(cycle, |previous| {
                        previous.saturating_mul(2).min(self.shared.config.max_backoff)
                    })
                    .max(cycle);
                self.backoff = Some(next);
                next
            }
            _ => {
                self.backoff = None;
                cycle
            }
        }
    }
}
