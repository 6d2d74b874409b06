//! Per-worker test orchestration: authentication lifecycle, probe dispatch,
//! the 401 retry rule, think time, and outcome aggregation.
mod session;
mod state;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, SecondsFormat};
use futures_util::FutureExt;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::catalog::{LOGIN_TEST, Scene, TestDescriptor};
use crate::config::Credentials;
use crate::error::{RegistryError, RunError};
use crate::metrics::MetricsRecorder;
use crate::probe::{
    FailureKind, LoginProbe, Probe, ProbeContext, ProbeRegistry, ProbeResult, RegisteredProbe,
};
use crate::transport::Transport;

pub use session::{AuthSession, AuthState, MAX_AUTH_FAILURES};
pub use state::{ErrorLogEntry, RunState};

/// Longest response body excerpt kept on outcomes and in the error log.
pub const BODY_EXCERPT_LIMIT: usize = 1000;

const RETRY_EXHAUSTED: &str = "received 401 after re-authentication and retry";

/// Everything workers share for one run. Built once, then read-only apart
/// from the append-only `run_state` and `recorder`.
pub struct RunPlan {
    pub selections: BTreeMap<Scene, Vec<TestDescriptor>>,
    pub registry: ProbeRegistry,
    pub transport: Arc<dyn Transport>,
    pub run_state: Arc<RunState>,
    pub recorder: Arc<MetricsRecorder>,
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub think_time: Duration,
}

impl RunPlan {
    /// Confirms every selected test has a registered probe, so a missing
    /// one fails the run before any worker starts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for the first selected test without a probe.
    pub fn verify_probes(&self) -> Result<(), RegistryError> {
        for (scene, tests) in &self.selections {
            for test in tests {
                self.registry.get(*scene, &test.identifier)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub test: String,
    pub success: bool,
    pub skipped: bool,
    pub http_status: Option<u16>,
    pub duration_ms: f64,
    pub body_excerpt: Option<String>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl TestOutcome {
    fn from_result(test: &str, result: &ProbeResult) -> Self {
        let (success, skipped, error, failure) = match result {
            ProbeResult::Success { .. } => (true, false, None, None),
            ProbeResult::Skipped { reason } => (true, true, Some(reason.clone()), None),
            ProbeResult::Failure { kind, detail, .. } => {
                (false, false, Some(detail.clone()), Some(*kind))
            }
        };
        Self {
            test: test.to_owned(),
            success,
            skipped,
            http_status: result.status(),
            duration_ms: result.duration_ms(),
            body_excerpt: result
                .response()
                .map(|response| excerpt(&response.body)),
            error,
            failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub scene: Scene,
    pub success: bool,
    pub results: Vec<TestOutcome>,
    pub total_duration_ms: f64,
    pub error_log: Vec<ErrorLogEntry>,
}

/// Drives one worker's selected tests. Each worker owns exactly one.
pub struct Orchestrator {
    vu_id: u64,
    plan: Arc<RunPlan>,
    session: AuthSession,
    vars: BTreeMap<String, String>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(vu_id: u64, plan: Arc<RunPlan>) -> Self {
        Self {
            vu_id,
            plan,
            session: AuthSession::default(),
            vars: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Runs every selected test of `scene` once, login first.
    ///
    /// Check failures and probe errors are recorded and never stop the
    /// remaining tests.
    ///
    /// # Errors
    ///
    /// Returns `AuthExhausted` once this worker's authentication has failed
    /// too often, `NoSelection` when nothing is selected for the scene, and
    /// `Registry` when a selected test has no probe.
    pub async fn run_scene(
        &mut self,
        scene: Scene,
        iteration: u64,
    ) -> Result<AggregateResult, RunError> {
        let plan = Arc::clone(&self.plan);
        let selection = plan
            .selections
            .get(&scene)
            .filter(|tests| !tests.is_empty())
            .ok_or_else(|| RunError::NoSelection {
                scene: scene.as_str().to_owned(),
            })?;

        let ordered = selection
            .iter()
            .filter(|test| test.is_login())
            .chain(selection.iter().filter(|test| !test.is_login()));

        let mut results = Vec::with_capacity(selection.len());
        let mut error_log = Vec::new();
        for test in ordered {
            let outcome = self.run_test(scene, test).await?;
            if let Some(entry) = self.classify(scene, &outcome, iteration) {
                plan.run_state.append(entry.clone());
                error_log.push(entry);
            }
            results.push(outcome);
            if !plan.think_time.is_zero() {
                tokio::time::sleep(plan.think_time).await;
            }
        }

        Ok(AggregateResult {
            scene,
            success: results.iter().all(|outcome| outcome.success),
            total_duration_ms: results.iter().map(|outcome| outcome.duration_ms).sum(),
            results,
            error_log,
        })
    }

    async fn run_test(
        &mut self,
        scene: Scene,
        test: &TestDescriptor,
    ) -> Result<TestOutcome, RunError> {
        let probe = self.plan.registry.get(scene, &test.identifier)?.clone();
        let result = match probe {
            RegisteredProbe::Login(login) => {
                self.session.begin()?;
                let result = self.invoke_login(login.as_ref()).await;
                self.absorb_login(&result);
                result
            }
            RegisteredProbe::Api(api) => self.run_api(api.as_ref()).await?,
        };
        if let ProbeResult::Success { captures, .. } = &result {
            self.vars
                .extend(captures.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        let outcome = TestOutcome::from_result(&test.identifier, &result);
        self.record_metrics(&test.metric_prefix(), &outcome);
        Ok(outcome)
    }

    async fn run_api(&mut self, probe: &dyn Probe) -> Result<ProbeResult, RunError> {
        self.ensure_authentication().await?;
        let held_token = self.session.token().is_some();
        let result = self.invoke(probe).await;
        if !(held_token && result.is_unauthorized()) {
            return Ok(result);
        }

        debug!("VU {} got 401; re-authenticating once.", self.vu_id);
        self.session.invalidate();
        self.plan.run_state.record_reauth();
        self.authenticate().await?;
        if self.session.token().is_none() {
            return Ok(result);
        }

        let retried = self.invoke(probe).await;
        if retried.is_unauthorized() {
            return Ok(ProbeResult::Failure {
                kind: FailureKind::Error,
                detail: RETRY_EXHAUSTED.to_owned(),
                response: retried.response().cloned(),
            });
        }
        Ok(retried)
    }

    /// Logs in lazily before a non-login probe when no token is held.
    async fn ensure_authentication(&mut self) -> Result<(), RunError> {
        match self.session.state() {
            AuthState::Authenticated { .. } | AuthState::Anonymous => Ok(()),
            AuthState::Failed => Err(RunError::AuthExhausted {
                attempts: self.session.failure_count(),
            }),
            AuthState::Unauthenticated | AuthState::Authenticating => self.authenticate().await,
        }
    }

    async fn authenticate(&mut self) -> Result<(), RunError> {
        let Some(login) = self.plan.registry.login_probe() else {
            self.session.skip();
            return Ok(());
        };
        self.session.begin()?;
        let result = self.invoke_login(login.as_ref()).await;
        self.absorb_login(&result);
        let outcome = TestOutcome::from_result(LOGIN_TEST, &result);
        self.record_metrics(&LOGIN_TEST.replace('-', "_"), &outcome);
        Ok(())
    }

    fn absorb_login(&mut self, result: &ProbeResult) {
        match result {
            ProbeResult::Success {
                credential: Some(credential),
                ..
            } => self.session.succeed(credential.access_token.clone()),
            ProbeResult::Skipped { reason } => {
                debug!("VU {} continues without a token: {}.", self.vu_id, reason);
                self.session.skip();
            }
            ProbeResult::Success {
                credential: None, ..
            }
            | ProbeResult::Failure { .. } => {
                self.session.fail();
                warn!(
                    "VU {} authentication failed ({} of {}).",
                    self.vu_id,
                    self.session.failure_count(),
                    MAX_AUTH_FAILURES
                );
            }
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_owned(), "application/json".to_owned())];
        if let Some(token) = self.session.token() {
            headers.push(("Authorization".to_owned(), format!("Bearer {}", token)));
        }
        headers
    }

    async fn invoke(&self, probe: &dyn Probe) -> ProbeResult {
        let headers = self.headers();
        let ctx = self.context(&headers);
        AssertUnwindSafe(probe.execute(&ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| ProbeResult::error(panic_message(panic.as_ref())))
    }

    async fn invoke_login(&self, probe: &dyn LoginProbe) -> ProbeResult {
        let headers = self.headers();
        let ctx = self.context(&headers);
        AssertUnwindSafe(probe.login(&ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| ProbeResult::error(panic_message(panic.as_ref())))
    }

    fn context<'ctx>(&'ctx self, headers: &'ctx [(String, String)]) -> ProbeContext<'ctx> {
        ProbeContext {
            base_url: &self.plan.base_url,
            headers,
            transport: self.plan.transport.as_ref(),
            vars: &self.vars,
            credentials: self.plan.credentials.as_ref(),
        }
    }

    fn record_metrics(&self, prefix: &str, outcome: &TestOutcome) {
        if outcome.skipped {
            return;
        }
        let recorder = &self.plan.recorder;
        recorder.add_rate(&format!("{}_errors", prefix), !outcome.success);
        recorder.add_counter(&format!("{}_requests", prefix), 1.0);
        if outcome.http_status.is_some() {
            recorder.add_trend(&format!("{}_response_time", prefix), outcome.duration_ms);
        }
    }

    /// Logs a failed outcome and turns it into an error-log entry.
    fn classify(
        &self,
        scene: Scene,
        outcome: &TestOutcome,
        iteration: u64,
    ) -> Option<ErrorLogEntry> {
        let kind = outcome.failure?;
        let message = outcome.error.clone().unwrap_or_default();
        match kind {
            FailureKind::Error => error!(
                "VU {} {}/{} failed: {} (status {:?}, body: {}).",
                self.vu_id,
                scene,
                outcome.test,
                message,
                outcome.http_status,
                outcome.body_excerpt.as_deref().unwrap_or("-")
            ),
            FailureKind::CheckFailure => {
                if self.plan.run_state.first_check_failure(scene, &outcome.test) {
                    warn!(
                        "{}/{} check failure: {} (status {:?}). Further check failures for this test are not logged.",
                        scene, outcome.test, message, outcome.http_status
                    );
                }
            }
        }
        Some(ErrorLogEntry {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            scene,
            test: outcome.test.clone(),
            kind,
            http_status: outcome.http_status,
            body_excerpt: outcome.body_excerpt.clone(),
            message,
            vu_id: self.vu_id,
            iteration,
        })
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LIMIT).collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("probe panicked: {}", detail)
}
