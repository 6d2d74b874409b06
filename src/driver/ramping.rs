use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::AppResult;

use super::vu::{DriverShared, Vu};

/// How often the VU target is recomputed.
const CONTROLLER_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RampStage {
    pub duration: Duration,
    pub target: u64,
}

/// Number of VUs that should be running `elapsed` into the ramp. Each stage
/// moves linearly from the previous target to its own.
pub(crate) fn target_vus(start_vus: u64, stages: &[RampStage], elapsed: Duration) -> u64 {
    let mut from = start_vus;
    let mut stage_start = Duration::ZERO;
    for stage in stages {
        let stage_end = stage_start.saturating_add(stage.duration);
        if elapsed < stage_end {
            let stage_ms = i128::try_from(stage.duration.as_millis()).unwrap_or(i128::MAX);
            let into_ms = i128::try_from(elapsed.saturating_sub(stage_start).as_millis())
                .unwrap_or(i128::MAX);
            let delta = i128::from(stage.target).saturating_sub(i128::from(from));
            let step = delta
                .saturating_mul(into_ms)
                .checked_div(stage_ms)
                .unwrap_or(0);
            let current = i128::from(from).saturating_add(step);
            return u64::try_from(current.max(0)).unwrap_or(u64::MAX);
        }
        from = stage.target;
        stage_start = stage_end;
    }
    from
}

struct RunningVu {
    retire: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub(super) async fn run(
    shared: Arc<DriverShared>,
    start_vus: u64,
    stages: Vec<RampStage>,
) -> AppResult<()> {
    let total = stages
        .iter()
        .fold(Duration::ZERO, |total, stage| total.saturating_add(stage.duration));
    let start = Instant::now();
    let mut shutdown_rx = shared.shutdown_tx.subscribe();
    let mut tick = interval(CONTROLLER_TICK);
    let mut running: Vec<RunningVu> = Vec::new();
    let mut retired: Vec<JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tick.tick() => {}
        }
        let elapsed = start.elapsed();
        if elapsed >= total {
            break;
        }

        let target = usize::try_from(target_vus(start_vus, &stages, elapsed)).unwrap_or(usize::MAX);
        if running.len() != target {
            debug!("Ramping VUs {} -> {}.", running.len(), target);
        }
        while running.len() < target {
            let retire = Arc::new(AtomicBool::new(false));
            let vu = Vu::new(&shared);
            let handle = tokio::spawn(vu.run_until(start, total, Some(Arc::clone(&retire))));
            running.push(RunningVu { retire, handle });
        }
        while running.len() > target {
            let Some(vu) = running.pop() else {
                break;
            };
            vu.retire.store(true, Ordering::Relaxed);
            retired.push(vu.handle);
        }
        retired.retain(|handle| !handle.is_finished());
    }

    for vu in &running {
        vu.retire.store(true, Ordering::Relaxed);
    }
    for handle in running.into_iter().map(|vu| vu.handle).chain(retired) {
        handle.await?;
    }
    Ok(())
}
