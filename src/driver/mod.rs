//! Load driver: runs a test setting's scenarios with one orchestrator per VU.
mod arrival;
mod constant;
mod ramping;
mod vu;


use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::catalog::Scene;
use crate::config::{ScenarioSpec, TestSetting, parse_duration_value};
use crate::error::{AppResult, ConfigError};
use crate::metrics::names;
use crate::orchestrator::RunPlan;
use crate::shutdown::ShutdownSender;

pub(crate) use arrival::ArrivalPlan;
pub(crate) use ramping::{RampStage, target_vus};

use vu::DriverShared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSummary {
    pub iterations: u64,
    pub aborted_iterations: u64,
    pub dropped_iterations: u64,
    pub elapsed: Duration,
}

/// A scenario with every duration parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExecutorPlan {
    ConstantVus { vus: u64, duration: Duration },
    RampingVus { start_vus: u64, stages: Vec<RampStage> },
    ConstantArrivalRate(ArrivalPlan),
}

impl ExecutorPlan {
    pub(crate) fn resolve(spec: &ScenarioSpec) -> Result<Self, ConfigError> {
        Ok(match spec {
            ScenarioSpec::ConstantVus { vus, duration } => ExecutorPlan::ConstantVus {
                vus: *vus,
                duration: parse_duration_value(duration)?,
            },
            ScenarioSpec::RampingVus { start_vus, stages } => ExecutorPlan::RampingVus {
                start_vus: *start_vus,
                stages: stages
                    .iter()
                    .map(|stage| {
                        Ok(RampStage {
                            duration: parse_duration_value(&stage.duration)?,
                            target: stage.target,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?,
            },
            ScenarioSpec::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                pre_allocated_vus,
                max_vus,
            } => ExecutorPlan::ConstantArrivalRate(ArrivalPlan {
                rate: *rate,
                time_unit: parse_duration_value(time_unit)?,
                duration: parse_duration_value(duration)?,
                pre_allocated_vus: *pre_allocated_vus,
                max_vus: *max_vus,
            }),
        })
    }
}

/// Runs every scenario of `setting` concurrently against `scene` and waits
/// for all of them. A shutdown broadcast stops new iterations; iterations
/// already running finish.
///
/// # Errors
///
/// Returns an error when a scenario duration is invalid or a VU task fails
/// to join.
pub async fn run_setting(
    plan: Arc<RunPlan>,
    scene: Scene,
    setting: &TestSetting,
    shutdown_tx: &ShutdownSender,
) -> AppResult<DriverSummary> {
    let executors = setting
        .scenarios
        .iter()
        .map(|(name, spec)| Ok((name.clone(), ExecutorPlan::resolve(spec)?)))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    plan.recorder
        .set_gauge(names::VUS_MAX, setting.max_vus() as f64);
    let shared = Arc::new(DriverShared::new(plan, scene, shutdown_tx.clone()));
    let start = Instant::now();

    let mut handles = Vec::with_capacity(executors.len());
    for (name, executor) in executors {
        info!("Starting scenario '{}' ({:?}).", name, executor);
        let shared = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            match executor {
                ExecutorPlan::ConstantVus { vus, duration } => {
                    constant::run(shared, vus, duration).await
                }
                ExecutorPlan::RampingVus { start_vus, stages } => {
                    ramping::run(shared, start_vus, stages).await
                }
                ExecutorPlan::ConstantArrivalRate(arrival) => arrival::run(shared, arrival).await,
            }
        }));
    }
    for handle in handles {
        handle.await??;
    }

    Ok(DriverSummary {
        iterations: shared.iterations.load(Ordering::Relaxed),
        aborted_iterations: shared.aborted.load(Ordering::Relaxed),
        dropped_iterations: shared.dropped.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    })
}
