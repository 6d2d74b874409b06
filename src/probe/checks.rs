use std::collections::BTreeMap;

use serde_json::Value;

use super::{Credential, FailureKind, ProbeResponse, ProbeResult};

/// Named pass/fail checks evaluated against one response.
pub(crate) struct CheckSet {
    response: ProbeResponse,
    json: Option<Value>,
    failed: Vec<String>,
}

impl CheckSet {
    pub(crate) fn new(response: ProbeResponse) -> Self {
        let json = serde_json::from_str(&response.body).ok();
        Self {
            response,
            json,
            failed: Vec::new(),
        }
    }

    pub(crate) fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    pub(crate) fn check(&mut self, name: &str, ok: bool) {
        if !ok {
            self.failed.push(name.to_owned());
        }
    }

    pub(crate) fn status_in(&mut self, name: &str, accepted: &[u16]) {
        let ok = accepted.contains(&self.response.status);
        self.check(name, ok);
    }

    pub(crate) fn faster_than(&mut self, name: &str, limit_ms: f64) {
        let ok = self.response.duration_ms < limit_ms;
        self.check(name, ok);
    }

    pub(crate) fn has_body(&mut self, name: &str) {
        let ok = !self.response.body.is_empty();
        self.check(name, ok);
    }

    pub(crate) fn valid_json(&mut self, name: &str) {
        let ok = self.json.is_some();
        self.check(name, ok);
    }

    /// Checks a predicate over the parsed body; fails when the body is not JSON.
    pub(crate) fn json_check<F>(&mut self, name: &str, predicate: F)
    where
        F: FnOnce(&Value) -> bool,
    {
        let ok = self.json.as_ref().is_some_and(predicate);
        self.check(name, ok);
    }

    pub(crate) fn finish(self, captures: BTreeMap<String, String>) -> ProbeResult {
        self.finish_with(None, captures)
    }

    pub(crate) fn finish_with(
        self,
        credential: Option<Credential>,
        captures: BTreeMap<String, String>,
    ) -> ProbeResult {
        if self.failed.is_empty() {
            ProbeResult::Success {
                response: self.response,
                credential,
                captures,
            }
        } else {
            ProbeResult::Failure {
                kind: FailureKind::CheckFailure,
                detail: format!("failed checks: {}", self.failed.join(", ")),
                response: Some(self.response),
            }
        }
    }
}

/// True for a JSON object without a truthy `error` field.
pub(crate) fn object_without_error(json: &Value) -> bool {
    json.is_object() && no_error_flag(json)
}

fn no_error_flag(json: &Value) -> bool {
    match json.get("error") {
        None | Some(Value::Null | Value::Bool(false)) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|value| value == 0.0),
        Some(Value::Bool(true) | Value::Array(_) | Value::Object(_)) => false,
    }
}
