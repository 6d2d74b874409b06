use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::AppResult;

use super::vu::{DriverShared, Vu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArrivalPlan {
    pub rate: u64,
    pub time_unit: Duration,
    pub duration: Duration,
    pub pre_allocated_vus: u64,
    pub max_vus: u64,
}

impl ArrivalPlan {
    /// Gap between two iteration starts, `None` when the rate is zero.
    pub(crate) fn period(&self) -> Option<Duration> {
        let rate = u32::try_from(self.rate).unwrap_or(u32::MAX);
        self.time_unit
            .checked_div(rate)
            .map(|period| period.max(Duration::from_millis(1)))
    }
}

/// Idle VUs waiting for the next scheduled iteration.
struct VuPool {
    idle: Mutex<Vec<Vu>>,
}

impl VuPool {
    fn take(&self) -> Option<Vu> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    fn give_back(&self, vu: Vu) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(vu);
    }
}

/// Starts iterations at a fixed rate. An iteration that finds no idle VU
/// and no room to allocate one is dropped and counted.
pub(super) async fn run(shared: Arc<DriverShared>, plan: ArrivalPlan) -> AppResult<()> {
    let Some(period) = plan.period() else {
        debug!("Arrival rate is zero; nothing to schedule.");
        return Ok(());
    };
    let max_vus = plan.max_vus.max(plan.pre_allocated_vus);
    let pool = Arc::new(VuPool {
        idle: Mutex::new(
            (0..plan.pre_allocated_vus)
                .map(|_| Vu::new(&shared))
                .collect(),
        ),
    });
    let mut allocated = plan.pre_allocated_vus;

    let start = Instant::now();
    let mut shutdown_rx = shared.shutdown_tx.subscribe();
    let mut tick = interval(period);
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tick.tick() => {}
        }
        if start.elapsed() >= plan.duration {
            break;
        }

        let vu = match pool.take() {
            Some(vu) => Some(vu),
            None if allocated < max_vus => {
                allocated = allocated.saturating_add(1);
                Some(Vu::new(&shared))
            }
            None => None,
        };
        let Some(mut vu) = vu else {
            shared.record_dropped();
            continue;
        };
        let pool = Arc::clone(&pool);
        in_flight.push(tokio::spawn(async move {
            vu.iterate().await;
            pool.give_back(vu);
        }));
        in_flight.retain(|handle| !handle.is_finished());
    }

    for handle in in_flight {
        handle.await?;
    }
    Ok(())
}
