
use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use loadscene::catalog::{Catalog, Scene, TestDescriptor};
use loadscene::config::Credentials;
use loadscene::metrics::MetricsRecorder;
use loadscene::orchestrator::{Orchestrator, RunPlan, RunState};
use loadscene::probe::ProbeRegistry;
use loadscene::transport::{MeteredTransport, ReqwestTransport, Transport};
use tempfile::tempdir;

use support_api::{RecordedRequest, TokenPolicy, run_loadscene, spawn_api_server_or_skip};

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

fn homepage_tests(names: &[&str]) -> Result<Vec<TestDescriptor>, String> {
    let catalog = Catalog::builtin();
    names
        .iter()
        .map(|name| {
            catalog
                .find_test(Scene::Homepage, name)
                .map_err(|err| err.to_string())
        })
        .collect()
}

fn plan_for(base_url: &str, tests: Vec<TestDescriptor>) -> Result<Arc<RunPlan>, String> {
    let recorder = Arc::new(MetricsRecorder::new());
    let http: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::new(Duration::from_secs(5)).map_err(|err| err.to_string())?,
    );
    Ok(Arc::new(RunPlan {
        selections: BTreeMap::from([(Scene::Homepage, tests)]),
        registry: ProbeRegistry::with_builtins(),
        transport: Arc::new(MeteredTransport::new(http, Arc::clone(&recorder))),
        run_state: Arc::new(RunState::new()),
        recorder,
        base_url: base_url.to_owned(),
        credentials: Credentials::from_parts(Some("tester".to_owned()), Some("secret".to_owned())),
        think_time: Duration::ZERO,
    }))
}

fn route(request: &RecordedRequest) -> String {
    format!(
        "{} {} {}",
        request.method,
        request.path,
        request.authorization.as_deref().unwrap_or("-")
    )
}

#[test]
fn e2e_login_then_token_on_protected_probe() -> Result<(), String> {
    let Some((url, server)) = spawn_api_server_or_skip(TokenPolicy::Stable)? else {
        return Ok(());
    };
    run_async_test(async {
        let plan = plan_for(&url, homepage_tests(&["auth-me", "auth-login"])?)?;
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 1)
            .await
            .map_err(|err| err.to_string())?;

        if !result.success || result.results.len() != 2 {
            return Err(format!("Unexpected aggregate: {:?}", result));
        }
        let order: Vec<&str> = result.results.iter().map(|outcome| outcome.test.as_str()).collect();
        if order != ["auth-login", "auth-me"] {
            return Err(format!("Login must run first: {:?}", order));
        }
        let routes: Vec<String> = server.requests().iter().map(route).collect();
        if routes != ["POST /auth/login -", "GET /auth/me Bearer tok-1"] {
            return Err(format!("Unexpected requests: {:?}", routes));
        }
        if !plan.run_state.error_log().is_empty() {
            return Err("Expected an empty error log".to_owned());
        }
        Ok(())
    })
}

#[test]
fn e2e_expired_token_reauthenticates_once() -> Result<(), String> {
    let Some((url, server)) = spawn_api_server_or_skip(TokenPolicy::ExpireFirst)? else {
        return Ok(());
    };
    run_async_test(async {
        let plan = plan_for(&url, homepage_tests(&["auth-me"])?)?;
        let mut orchestrator = Orchestrator::new(1, Arc::clone(&plan));
        let result = orchestrator
            .run_scene(Scene::Homepage, 1)
            .await
            .map_err(|err| err.to_string())?;

        let outcome = result
            .results
            .first()
            .ok_or_else(|| "Missing outcome".to_owned())?;
        if !outcome.success || outcome.http_status != Some(200) {
            return Err(format!("Retry did not succeed: {:?}", outcome));
        }
        let routes: Vec<String> = server.requests().iter().map(route).collect();
        let expected = [
            "POST /auth/login -",
            "GET /auth/me Bearer tok-1",
            "POST /auth/login -",
            "GET /auth/me Bearer tok-2",
        ];
        if routes != expected {
            return Err(format!("Unexpected requests: {:?}", routes));
        }
        if plan.run_state.reauth_count() != 1 {
            return Err(format!(
                "Expected one re-authentication, got {}",
                plan.run_state.reauth_count()
            ));
        }
        Ok(())
    })
}

#[test]
fn e2e_cli_run_writes_reports() -> Result<(), String> {
    let Some((url, _server)) = spawn_api_server_or_skip(TokenPolicy::Stable)? else {
        return Ok(());
    };
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let reports_dir = dir.path().join("reports");

    let args = vec![
        "--scene".to_owned(),
        "homepage".to_owned(),
        "--tests".to_owned(),
        "1-2".to_owned(),
        "--setting".to_owned(),
        "constant-vus".to_owned(),
        "--users".to_owned(),
        "1".to_owned(),
        "--duration".to_owned(),
        "1s".to_owned(),
        "--base-url".to_owned(),
        url,
        "--reports-dir".to_owned(),
        reports_dir.to_string_lossy().into_owned(),
        "--no-color".to_owned(),
    ];
    let output = run_loadscene(
        args,
        &[("DEV_TEST_USERNAME", "tester"), ("DEV_TEST_PASSWORD", "secret")],
    )?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        return Err(format!(
            "stdout: {}\nstderr: {}",
            stdout,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    if !stdout.contains("LOAD TEST SUMMARY") || !stdout.contains("auth_me_requests") {
        return Err(format!("Summary missing from stdout: {}", stdout));
    }

    let mut names: Vec<String> = fs::read_dir(&reports_dir)
        .map_err(|err| format!("read reports dir failed: {}", err))?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let extensions: Vec<&str> = names
        .iter()
        .filter_map(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .collect();
    if extensions != ["csv", "html", "json"] {
        return Err(format!("Unexpected report files: {:?}", names));
    }
    if !names
        .iter()
        .all(|name| name.starts_with("development_") && name.contains("_homepage_tests-1-2."))
    {
        return Err(format!("Unexpected report names: {:?}", names));
    }

    let csv_name = names
        .iter()
        .find(|name| name.ends_with(".csv"))
        .ok_or_else(|| "Missing CSV".to_owned())?;
    let csv = fs::read_to_string(reports_dir.join(csv_name))
        .map_err(|err| format!("read csv failed: {}", err))?;
    if csv.lines().count() != 2 {
        return Err(format!("CSV must have two lines: {}", csv));
    }
    Ok(())
}

#[test]
fn e2e_cli_rejects_unknown_test_number() -> Result<(), String> {
    let output = run_loadscene(["--scene", "homepage", "--tests", "1,9"], &[])?;
    if output.status.success() {
        return Err("Expected a selection error".to_owned());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.contains("UnknownOrdinal") {
        return Err(format!("Unexpected stderr: {}", stderr));
    }
    Ok(())
}

#[test]
fn e2e_cli_list() -> Result<(), String> {
    let output = run_loadscene(["list"], &[])?;
    if !output.status.success() {
        return Err(format!(
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("1. auth-login") || !stdout.contains("Test settings:") {
        return Err(format!("Unexpected listing: {}", stdout));
    }
    Ok(())
}
