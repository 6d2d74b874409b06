use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::catalog::Scene;
use crate::error::RunError;
use crate::metrics::names;
use crate::orchestrator::{Orchestrator, RunPlan};
use crate::shutdown::{ShutdownReceiver, ShutdownSender};

/// Pause after an aborted iteration so a worker whose authentication is
/// exhausted does not spin.
const ABORT_BACKOFF: Duration = Duration::from_millis(500);

/// State shared by every VU of one run.
pub(super) struct DriverShared {
    pub(super) plan: Arc<RunPlan>,
    pub(super) scene: Scene,
    pub(super) shutdown_tx: ShutdownSender,
    next_vu_id: AtomicU64,
    active_vus: AtomicU64,
    pub(super) iterations: AtomicU64,
    pub(super) aborted: AtomicU64,
    pub(super) dropped: AtomicU64,
}

impl DriverShared {
    pub(super) fn new(plan: Arc<RunPlan>, scene: Scene, shutdown_tx: ShutdownSender) -> Self {
        Self {
            plan,
            scene,
            shutdown_tx,
            next_vu_id: AtomicU64::new(1),
            active_vus: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn publish_active(&self, active: u64) {
        self.plan.recorder.set_gauge(names::VUS, active as f64);
    }

    pub(super) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.plan
            .recorder
            .add_counter(names::DROPPED_ITERATIONS, 1.0);
    }
}

/// One virtual user: an orchestrator plus its iteration counter.
pub(super) struct Vu {
    shared: Arc<DriverShared>,
    orchestrator: Orchestrator,
    shutdown_rx: ShutdownReceiver,
    shutdown_seen: bool,
    iteration: u64,
    exhausted_logged: bool,
}

impl Vu {
    pub(super) fn new(shared: &Arc<DriverShared>) -> Self {
        let vu_id = shared.next_vu_id.fetch_add(1, Ordering::Relaxed);
        let active = shared
            .active_vus
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        shared.publish_active(active);
        Self {
            shared: Arc::clone(shared),
            orchestrator: Orchestrator::new(vu_id, Arc::clone(&shared.plan)),
            shutdown_rx: shared.shutdown_tx.subscribe(),
            shutdown_seen: false,
            iteration: 0,
            exhausted_logged: false,
        }
    }

    /// Checks the shutdown channel without waiting.
    pub(super) fn stop_requested(&mut self) -> bool {
        if !self.shutdown_seen {
            self.shutdown_seen = !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty));
        }
        self.shutdown_seen
    }

    /// Runs the scene once and records iteration metrics.
    pub(super) async fn iterate(&mut self) {
        let start = Instant::now();
        let result = self
            .orchestrator
            .run_scene(self.shared.scene, self.iteration)
            .await;
        self.iteration = self.iteration.saturating_add(1);

        let recorder = &self.shared.plan.recorder;
        recorder.add_counter(names::ITERATIONS, 1.0);
        recorder.add_trend(
            names::ITERATION_DURATION,
            start.elapsed().as_secs_f64() * 1000.0,
        );
        self.shared.iterations.fetch_add(1, Ordering::Relaxed);

        let Err(err) = result else {
            return;
        };
        self.shared.aborted.fetch_add(1, Ordering::Relaxed);
        match err {
            RunError::AuthExhausted { .. } => {
                if !self.exhausted_logged {
                    warn!("Iteration aborted: {}", err);
                    self.exhausted_logged = true;
                }
            }
            RunError::NoSelection { .. } | RunError::Registry(_) => {
                error!("Iteration aborted: {}", err);
            }
        }
        self.backoff().await;
    }

    async fn backoff(&mut self) {
        let pause = self.shared.plan.think_time.max(ABORT_BACKOFF);
        tokio::select! {
            _ = self.shutdown_rx.recv() => self.shutdown_seen = true,
            () = tokio::time::sleep(pause) => {}
        }
    }

    /// Iterates until `duration` has passed since `start`, shutdown is
    /// broadcast, or `retire` is raised. Checks only between iterations.
    pub(super) async fn run_until(
        mut self,
        start: Instant,
        duration: Duration,
        retire: Option<Arc<AtomicBool>>,
    ) {
        loop {
            let retired = retire
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed));
            if retired || start.elapsed() >= duration || self.stop_requested() {
                break;
            }
            self.iterate().await;
        }
    }
}

impl Drop for Vu {
    fn drop(&mut self) {
        let previous = self
            .shared
            .active_vus
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            })
            .unwrap_or(0);
        self.shared.publish_active(previous.saturating_sub(1));
    }
}
