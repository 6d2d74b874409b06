use super::*;
use crate::catalog::Catalog;
use crate::error::HttpError;
use crate::metrics::MetricsRecorder;
use crate::transport::{TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::FmtSubscriber;

const LOGIN_OK: &str = r#"{"error":false,"data":{"access_token":"tok","user_info":{"id":1}}}"#;

/// Serves scripted responses per path; the last response of a script repeats.
#[derive(Default)]
struct ScriptedApi {
    scripts: HashMap<&'static str, Vec<(u16, String)>>,
    calls: Mutex<Vec<String>>,
    bearer_calls: AtomicUsize,
}

impl ScriptedApi {
    fn route(mut self, path: &'static str, responses: Vec<(u16, &str)>) -> Self {
        let owned = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_owned()))
            .collect();
        self.scripts.insert(path, owned);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn count(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedApi {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let path = request
            .url
            .strip_prefix("http://api.test")
            .unwrap_or(&request.url)
            .to_owned();
        let seen = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_poisoned| HttpError::Unavailable {
                    message: "poisoned".to_owned(),
                })?;
            let seen = calls.iter().filter(|call| **call == path).count();
            calls.push(path.clone());
            seen
        };
        let script = self
            .scripts
            .get(path.as_str())
            .ok_or_else(|| HttpError::Unavailable {
                message: format!("no route for {}", path),
            })?;
        let (status, body) = script
            .get(seen)
            .or_else(|| script.last())
            .cloned()
            .ok_or_else(|| HttpError::Unavailable {
                message: format!("empty script for {}", path),
            })?;
        if request
            .headers
            .iter()
            .any(|(name, value)| name == "Authorization" && value == "Bearer tok")
        {
            self.bearer_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(TransportResponse {
            status,
            headers: Vec::new(),
            body,
            duration_ms: 10.0,
        })
    }
}

struct PanickingProbe;

#[async_trait]
impl Probe for PanickingProbe {
    #[expect(clippy::panic, reason = "Probe panics are isolated by the orchestrator")]
    async fn execute(&self, _ctx: &ProbeContext<'_>) -> ProbeResult {
        panic!("boom");
    }
}

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Like `run_async_test`, but on a paused clock that jumps to the next timer.
fn run_paused_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Collects formatted log output.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        self.0
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_poisoned| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn credentials() -> Option<Credentials> {
    Credentials::from_parts(Some("tester".to_owned()), Some("secret".to_owned()))
}

fn homepage_tests(ordinals: &[u32]) -> Vec<TestDescriptor> {
    let catalog = Catalog::builtin();
    ordinals
        .iter()
        .filter_map(|ordinal| {
            catalog
                .tests(Scene::Homepage)
                .iter()
                .find(|test| test.ordinal == *ordinal)
                .cloned()
        })
        .collect()
}

fn plan(
    api: Arc<ScriptedApi>,
    registry: ProbeRegistry,
    tests: Vec<TestDescriptor>,
    credentials: Option<Credentials>,
) -> Arc<RunPlan> {
    plan_with_think_time(api, registry, tests, credentials, Duration::ZERO)
}

fn plan_with_think_time(
    api: Arc<ScriptedApi>,
    registry: ProbeRegistry,
    tests: Vec<TestDescriptor>,
    credentials: Option<Credentials>,
    think_time: Duration,
) -> Arc<RunPlan> {
    Arc::new(RunPlan {
        selections: BTreeMap::from([(Scene::Homepage, tests)]),
        registry,
        transport: api,
        run_state: Arc::new(RunState::new()),
        recorder: Arc::new(MetricsRecorder::new()),
        base_url: "http://api.test".to_owned(),
        credentials,
        think_time,
    })
}

#[test]
fn login_runs_first_and_token_is_used() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/login", vec![(200, LOGIN_OK)])
                .route("/auth/me", vec![(200, "{}")]),
        );
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2, 1]),
            credentials(),
        );
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 0)
            .await
            .map_err(|err| err.to_string())?;

        let order: Vec<&str> = result.results.iter().map(|outcome| outcome.test.as_str()).collect();
        if order != ["auth-login", "auth-me"] {
            return Err(format!("Unexpected order: {:?}", order));
        }
        if !result.success || !result.error_log.is_empty() {
            return Err(format!("Expected clean run: {:?}", result));
        }
        if api.calls() != ["/auth/login", "/auth/me"] {
            return Err(format!("Unexpected calls: {:?}", api.calls()));
        }
        if api.bearer_calls.load(Ordering::SeqCst) != 1 {
            return Err("Expected the token on the auth-me request".to_owned());
        }
        if (result.total_duration_ms - 20.0).abs() > f64::EPSILON {
            return Err(format!("Unexpected total: {}", result.total_duration_ms));
        }
        Ok(())
    })
}

#[test]
fn auth_exhausts_after_three_failures_without_network() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/login", vec![(500, "{}")])
                .route("/auth/me", vec![(200, "{}")]),
        );
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2]),
            credentials(),
        );
        let mut orchestrator = Orchestrator::new(7, plan);
        for iteration in 0..3 {
            orchestrator
                .run_scene(Scene::Homepage, iteration)
                .await
                .map_err(|err| format!("Iteration {} aborted early: {}", iteration, err))?;
        }
        if orchestrator.session().state() != &AuthState::Failed {
            return Err(format!("Expected Failed, got {:?}", orchestrator.session().state()));
        }

        let calls_before = api.calls().len();
        match orchestrator.run_scene(Scene::Homepage, 3).await {
            Err(RunError::AuthExhausted { attempts: 3 }) => {}
            other => return Err(format!("Expected AuthExhausted: {:?}", other)),
        }
        if api.calls().len() != calls_before || api.count("/auth/login") != 3 {
            return Err(format!("Unexpected calls: {:?}", api.calls()));
        }
        Ok(())
    })
}

#[test]
fn unauthorized_triggers_single_reauth_and_retry() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/login", vec![(200, LOGIN_OK)])
                .route("/auth/me", vec![(401, ""), (200, "{}")]),
        );
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2]),
            credentials(),
        );
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 0)
            .await
            .map_err(|err| err.to_string())?;

        if !result.success {
            return Err(format!("Expected retry to succeed: {:?}", result));
        }
        if plan.run_state.reauth_count() != 1 {
            return Err(format!("Unexpected reauth count: {}", plan.run_state.reauth_count()));
        }
        if api.count("/auth/login") != 2 || api.count("/auth/me") != 2 {
            return Err(format!("Unexpected calls: {:?}", api.calls()));
        }
        Ok(())
    })
}

#[test]
fn second_unauthorized_is_a_failed_outcome() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/login", vec![(200, LOGIN_OK)])
                .route("/auth/me", vec![(401, "denied")]),
        );
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2]),
            credentials(),
        );
        let mut orchestrator = Orchestrator::new(2, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 4)
            .await
            .map_err(|err| err.to_string())?;

        let outcome = result
            .results
            .first()
            .ok_or_else(|| "Missing outcome".to_owned())?;
        if outcome.success
            || outcome.http_status != Some(401)
            || outcome.error.as_deref() != Some(RETRY_EXHAUSTED)
        {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        if api.count("/auth/me") != 2 {
            return Err(format!("Expected exactly one retry: {:?}", api.calls()));
        }
        let logged = plan.run_state.error_log();
        let entry = logged.first().ok_or_else(|| "Missing log entry".to_owned())?;
        if entry.kind != FailureKind::Error || entry.vu_id != 2 || entry.iteration != 4 {
            return Err(format!("Unexpected entry: {:?}", entry));
        }
        if entry.body_excerpt.as_deref() != Some("denied") {
            return Err(format!("Unexpected excerpt: {:?}", entry.body_excerpt));
        }
        Ok(())
    })
}

#[test]
fn errors_are_logged_with_status_and_capped_body() -> Result<(), String> {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::ERROR)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let long_body = "x".repeat(BODY_EXCERPT_LIMIT + 500);

    tracing::subscriber::with_default(subscriber, || {
        run_async_test(async {
            let api = Arc::new(
                ScriptedApi::default()
                    .route("/auth/login", vec![(200, LOGIN_OK)])
                    .route("/auth/me", vec![(401, long_body.as_str())]),
            );
            let plan = plan(
                api,
                ProbeRegistry::with_builtins(),
                homepage_tests(&[2]),
                credentials(),
            );
            let mut orchestrator = Orchestrator::new(5, plan);
            let result = orchestrator
                .run_scene(Scene::Homepage, 0)
                .await
                .map_err(|err| err.to_string())?;
            if result.success {
                return Err("Expected a failed outcome".to_owned());
            }
            Ok(())
        })
    })?;

    let text = logs.text();
    let capped = "x".repeat(BODY_EXCERPT_LIMIT);
    if !text.contains("VU 5 homepage/auth-me failed")
        || !text.contains("status Some(401)")
        || !text.contains(&format!("body: {}", capped))
    {
        return Err(format!("Error log line lacks detail: {}", text));
    }
    if text.contains(&"x".repeat(BODY_EXCERPT_LIMIT + 1)) {
        return Err("Logged body was not capped".to_owned());
    }
    Ok(())
}

#[test]
fn think_time_follows_every_test() -> Result<(), String> {
    run_paused_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/me", vec![(200, "{}")])
                .route("/auth/features", vec![(200, "{}")]),
        );
        let plan = plan_with_think_time(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2, 3]),
            None,
            Duration::from_secs(1),
        );
        let mut orchestrator = Orchestrator::new(1, plan);
        let start = tokio::time::Instant::now();
        let result = orchestrator
            .run_scene(Scene::Homepage, 0)
            .await
            .map_err(|err| err.to_string())?;
        let elapsed = start.elapsed();

        if !result.success || result.results.len() != 2 {
            return Err(format!("Unexpected result: {:?}", result));
        }
        if elapsed < Duration::from_secs(2) || elapsed >= Duration::from_millis(2100) {
            return Err(format!("Expected 2s of think time, got {:?}", elapsed));
        }
        if api.calls() != ["/auth/me", "/auth/features"] {
            return Err(format!("Unexpected calls: {:?}", api.calls()));
        }
        Ok(())
    })
}

#[test]
fn unregistered_selection_fails_before_running() -> Result<(), String> {
    let api = Arc::new(ScriptedApi::default());
    let missing = plan(
        Arc::clone(&api),
        ProbeRegistry::new(),
        homepage_tests(&[2]),
        None,
    );
    match missing.verify_probes() {
        Err(RegistryError::NotFound { scene, test })
            if scene == "homepage" && test == "auth-me" => {}
        other => return Err(format!("Expected NotFound: {:?}", other)),
    }
    if !api.calls().is_empty() {
        return Err(format!("No request may be sent: {:?}", api.calls()));
    }

    let complete = plan(
        api,
        ProbeRegistry::with_builtins(),
        homepage_tests(&[1, 2, 3, 4]),
        None,
    );
    complete.verify_probes().map_err(|err| err.to_string())
}

#[test]
fn missing_credentials_run_anonymously() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(ScriptedApi::default().route("/auth/me", vec![(200, "{}")]));
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[1, 2]),
            None,
        );
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 0)
            .await
            .map_err(|err| err.to_string())?;

        let login = result
            .results
            .first()
            .ok_or_else(|| "Missing login outcome".to_owned())?;
        if !login.skipped || !login.success || !result.success {
            return Err(format!("Unexpected result: {:?}", result));
        }
        if orchestrator.session().state() != &AuthState::Anonymous {
            return Err(format!("Unexpected state: {:?}", orchestrator.session().state()));
        }
        if api.calls() != ["/auth/me"] {
            return Err(format!("Unexpected calls: {:?}", api.calls()));
        }
        let snapshot = plan.recorder.snapshot(Duration::from_secs(1), &[]);
        if snapshot.metrics.contains_key("auth_login_requests")
            || !snapshot.metrics.contains_key("auth_me_requests")
        {
            return Err(format!("Unexpected metrics: {:?}", snapshot.metrics.keys()));
        }
        Ok(())
    })
}

#[test]
fn panicking_probe_becomes_failed_outcome() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(ScriptedApi::default());
        let mut registry = ProbeRegistry::new();
        registry
            .register(Scene::Homepage, "auth-me", PanickingProbe)
            .map_err(|err| err.to_string())?;
        let plan = plan(api, registry, homepage_tests(&[2]), None);
        let mut orchestrator = Orchestrator::new(1, plan);
        let result = orchestrator
            .run_scene(Scene::Homepage, 0)
            .await
            .map_err(|err| err.to_string())?;
        let outcome = result
            .results
            .first()
            .ok_or_else(|| "Missing outcome".to_owned())?;
        match (outcome.failure, outcome.error.as_deref()) {
            (Some(FailureKind::Error), Some(message)) if message.contains("boom") => Ok(()),
            _ => Err(format!("Unexpected outcome: {:?}", outcome)),
        }
    })
}

#[test]
fn check_failures_do_not_stop_the_selection() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(
            ScriptedApi::default()
                .route("/auth/me", vec![(500, "oops")])
                .route("/auth/features", vec![(200, "{}")]),
        );
        let plan = plan(
            Arc::clone(&api),
            ProbeRegistry::with_builtins(),
            homepage_tests(&[2, 3]),
            None,
        );
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        for iteration in 0..2 {
            let result = orchestrator
                .run_scene(Scene::Homepage, iteration)
                .await
                .map_err(|err| err.to_string())?;
            if result.success || result.results.len() != 2 || result.error_log.len() != 1 {
                return Err(format!("Unexpected result: {:?}", result));
            }
        }
        let logged = plan.run_state.error_log();
        if logged.len() != 2
            || logged
                .iter()
                .any(|entry| entry.kind != FailureKind::CheckFailure)
        {
            return Err(format!("Unexpected log: {:?}", logged));
        }
        if plan.run_state.first_check_failure(Scene::Homepage, "auth-me") {
            return Err("Check failure must already be recorded".to_owned());
        }
        Ok(())
    })
}

#[test]
fn unknown_scene_selection_is_reported() -> Result<(), String> {
    run_async_test(async {
        let api = Arc::new(ScriptedApi::default());
        let plan = plan(api, ProbeRegistry::with_builtins(), homepage_tests(&[2]), None);
        let mut orchestrator = Orchestrator::new(1, plan);
        match orchestrator.run_scene(Scene::Quotation, 0).await {
            Err(RunError::NoSelection { scene }) if scene == "quotation" => Ok(()),
            other => Err(format!("Expected NoSelection: {:?}", other)),
        }
    })
}

#[test]
fn session_state_machine() -> Result<(), String> {
    let mut session = AuthSession::new(2);
    session.begin().map_err(|err| err.to_string())?;
    session.fail();
    if session.state() != &AuthState::Unauthenticated || session.failure_count() != 1 {
        return Err(format!("Unexpected session: {:?}", session));
    }
    session.begin().map_err(|err| err.to_string())?;
    session.succeed("t".to_owned());
    if session.token() != Some("t") || session.failure_count() != 0 {
        return Err(format!("Unexpected session: {:?}", session));
    }
    session.invalidate();
    session.fail();
    session.fail();
    match session.begin() {
        Err(RunError::AuthExhausted { attempts: 2 }) => Ok(()),
        other => Err(format!("Expected AuthExhausted: {:?}", other)),
    }
}
