use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::transport::Method;

use super::checks::CheckSet;
use super::{Credential, LoginProbe, Probe, ProbeContext, ProbeResult};

/// `POST /auth/login`; yields the bearer token used by every later probe.
pub(crate) struct AuthLogin;

#[async_trait]
impl LoginProbe for AuthLogin {
    async fn login(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        let Some(credentials) = ctx.credentials else {
            return ProbeResult::Skipped {
                reason: "credentials not configured".to_owned(),
            };
        };
        let payload = json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        let response = match ctx.send(Method::Post, "/auth/login", Some(&payload)).await {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };

        let mut checks = CheckSet::new(response.into());
        checks.status_in("login status is 200", &[200]);
        checks.faster_than("login response time < 3s", 3000.0);
        checks.has_body("login has body");
        checks.valid_json("login valid JSON");
        checks.json_check("login response has access_token", |json| {
            access_token(json).is_some()
        });
        checks.json_check("login response error is false", |json| {
            json.get("error") == Some(&Value::Bool(false))
        });
        checks.json_check("login response has user_info", |json| {
            json.pointer("/data/user_info").is_some_and(truthy)
        });

        let credential = checks
            .json()
            .and_then(access_token)
            .map(|token| Credential {
                access_token: token.to_owned(),
            });
        checks.finish_with(credential, BTreeMap::new())
    }
}

fn access_token(json: &Value) -> Option<&str> {
    json.pointer("/data/access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(text) => !text.is_empty(),
        Value::Number(_) | Value::Bool(true) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// `GET /auth/me`
pub(crate) struct AuthMe;

#[async_trait]
impl Probe for AuthMe {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        simple_get(ctx, "/auth/me", "auth me").await
    }
}

/// `GET /auth/features`
pub(crate) struct AuthFeatures;

#[async_trait]
impl Probe for AuthFeatures {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        simple_get(ctx, "/auth/features", "auth features").await
    }
}

/// `GET /master/categories`; the body must be a JSON array or object.
pub(crate) struct MasterCategories;

#[async_trait]
impl Probe for MasterCategories {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        let response = match ctx.send(Method::Get, "/master/categories", None).await {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };
        let mut checks = CheckSet::new(response.into());
        checks.status_in("master categories status is 200", &[200]);
        checks.faster_than("master categories response time < 2s", 2000.0);
        checks.json_check("master categories returns data", |json| {
            json.is_array() || json.is_object()
        });
        checks.finish(BTreeMap::new())
    }
}

async fn simple_get(ctx: &ProbeContext<'_>, path: &str, label: &str) -> ProbeResult {
    let response = match ctx.send(Method::Get, path, None).await {
        Ok(response) => response,
        Err(err) => return ProbeResult::transport_error(&err),
    };
    let mut checks = CheckSet::new(response.into());
    checks.status_in(&format!("{} status is 200", label), &[200]);
    checks.faster_than(&format!("{} response time < 2s", label), 2000.0);
    checks.has_body(&format!("{} has body", label));
    checks.finish(BTreeMap::new())
}

/// Runs auth-me, auth-features and master-categories in order and returns
/// the first failing result, or `None` when all passed.
pub(crate) async fn prerequisite_failure(ctx: &ProbeContext<'_>) -> Option<ProbeResult> {
    let probes: [&dyn Probe; 3] = [&AuthMe, &AuthFeatures, &MasterCategories];
    for probe in probes {
        let result = probe.execute(ctx).await;
        if !matches!(result, ProbeResult::Success { .. }) {
            return Some(result);
        }
    }
    None
}

