use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::args::RunArgs;
use crate::catalog::{Catalog, Scene, SelectionMode, TestDescriptor, parse_selection};
use crate::config::{
    ConfigFile, DEFAULT_ENVIRONMENT, DEFAULT_SETTING, Environment, TestSetting, apply_overrides,
    resolve_environment, resolve_setting,
};
use crate::driver::{self, DriverSummary};
use crate::error::{AppError, AppResult, ConfigError, ValidationError};
use crate::metrics::{MetricsRecorder, MetricsSnapshot, ThresholdBreach};
use crate::orchestrator::{RunPlan, RunState};
use crate::probe::ProbeRegistry;
use crate::report::{
    Reports, RunMetadata, WrittenReports, generate_reports, selection_name, write_reports,
};
use crate::shutdown::ShutdownSender;
use crate::transport::{MeteredTransport, ReqwestTransport, Transport};

pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// Run parameters after merging CLI, config file and built-in defaults.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub scene: Scene,
    pub selection: Vec<TestDescriptor>,
    pub test_name: String,
    pub environment: Environment,
    pub setting: TestSetting,
    pub reports_dir: PathBuf,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub driver: DriverSummary,
    pub snapshot: MetricsSnapshot,
    pub reports: Reports,
    pub written: WrittenReports,
    pub breaches: Vec<ThresholdBreach>,
    pub error_count: usize,
}

/// Resolves scene, selection, environment, setting and reports directory.
/// CLI values win over the config file, which wins over the defaults.
/// `lookup` reads credential variables.
///
/// # Errors
///
/// Returns an error when the scene is missing or unknown, the selection is
/// invalid, or the environment or setting cannot be resolved.
pub fn resolve_run<F>(args: &RunArgs, file: Option<&ConfigFile>, lookup: F) -> AppResult<ResolvedRun>
where
    F: Fn(&str) -> Option<String>,
{
    let scene: Scene = args
        .scene
        .as_deref()
        .or_else(|| file.and_then(|file| file.scene.as_deref()))
        .ok_or_else(|| AppError::validation(ValidationError::MissingScene))?
        .parse()?;

    let catalog = Catalog::builtin();
    let scene_tests = catalog.tests(scene);
    let selection = match args.test.as_deref() {
        Some(test) => vec![catalog.find_test(scene, test)?],
        None => {
            let expression = args
                .tests
                .as_deref()
                .or_else(|| file.and_then(|file| file.tests.as_deref()))
                .unwrap_or("all");
            let lenient = args.lenient_selection
                || file
                    .and_then(|file| file.lenient_selection)
                    .unwrap_or(false);
            let mode = if lenient {
                SelectionMode::Lenient
            } else {
                SelectionMode::Strict
            };
            parse_selection(expression, scene_tests, mode)?
        }
    };
    let test_name = selection_name(&selection, scene_tests);

    let environment_name = args
        .environment
        .as_deref()
        .or_else(|| file.and_then(|file| file.environment.as_deref()))
        .unwrap_or(DEFAULT_ENVIRONMENT);
    let mut environment = resolve_environment(environment_name, file, lookup)?;
    if let Some(base_url) = args.base_url.as_deref() {
        base_url.clone_into(&mut environment.base_url);
    }
    url::Url::parse(&environment.base_url).map_err(|err| {
        AppError::config(ConfigError::InvalidBaseUrl {
            url: environment.base_url.clone(),
            source: err,
        })
    })?;

    let setting_name = args
        .setting
        .as_deref()
        .or_else(|| file.and_then(|file| file.setting.as_deref()))
        .unwrap_or(DEFAULT_SETTING);
    let mut setting = resolve_setting(setting_name, file)?;
    apply_overrides(&mut setting, args.users, args.duration.as_deref())?;

    let reports_dir = PathBuf::from(
        args.reports_dir
            .as_deref()
            .or_else(|| file.and_then(|file| file.reports_dir.as_deref()))
            .unwrap_or(DEFAULT_REPORTS_DIR),
    );

    Ok(ResolvedRun {
        scene,
        selection,
        test_name,
        environment,
        setting,
        reports_dir,
    })
}

/// Drives the selected tests under the setting's load profile, then renders
/// and writes the reports. Threshold breaches are returned, not raised.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be built, a selected test
/// has no registered probe, the driver fails, or reports cannot be rendered
/// or written.
pub async fn run_load_test(
    resolved: ResolvedRun,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunOutcome> {
    let ResolvedRun {
        scene,
        selection,
        test_name,
        environment,
        setting,
        reports_dir,
    } = resolved;
    let thresholds = setting.parsed_thresholds()?;

    let recorder = Arc::new(MetricsRecorder::new());
    let http: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(environment.timeout)?);
    let transport: Arc<dyn Transport> =
        Arc::new(MeteredTransport::new(http, Arc::clone(&recorder)));
    let run_state = Arc::new(RunState::new());

    if environment.credentials.is_none() {
        warn!(
            "No credentials configured for environment '{}'; login is skipped.",
            environment.name
        );
    }
    let plan = Arc::new(RunPlan {
        selections: BTreeMap::from([(scene, selection)]),
        registry: ProbeRegistry::with_builtins(),
        transport,
        run_state: Arc::clone(&run_state),
        recorder: Arc::clone(&recorder),
        base_url: environment.base_url.clone(),
        credentials: environment.credentials.clone(),
        think_time: setting.think_time(),
    });
    plan.verify_probes()?;

    let started_at = Local::now();
    info!(
        "Running {}/{} against {} ({}) with setting '{}'.",
        scene, test_name, environment.name, environment.base_url, setting.name
    );
    let driver_summary = driver::run_setting(plan, scene, &setting, shutdown_tx).await?;
    let mut metadata = RunMetadata::new(
        scene,
        test_name,
        setting,
        environment.name,
        &started_at,
    );
    metadata.finish(&Local::now());
    info!(
        "Finished after {:.2}s: {} iterations, {} aborted, {} dropped.",
        driver_summary.elapsed.as_secs_f64(),
        driver_summary.iterations,
        driver_summary.aborted_iterations,
        driver_summary.dropped_iterations
    );

    let snapshot = recorder.snapshot(driver_summary.elapsed, &thresholds);
    let error_log = run_state.error_log();
    let reports = generate_reports(&snapshot, &metadata, &error_log, &Local::now())?;
    println!("{}", reports.summary);
    let written = write_reports(&reports_dir, &reports).await?;

    let breaches = snapshot.breached_thresholds();
    for breach in &breaches {
        warn!("Threshold breached: {} {}", breach.metric, breach.expression);
    }

    Ok(RunOutcome {
        driver: driver_summary,
        snapshot,
        reports,
        written,
        breaches,
        error_count: error_log.len(),
    })
}
