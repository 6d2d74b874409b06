//! Probes: one API call plus the checks that decide whether it passed.
mod checks;
mod homepage;
mod quotation;
mod registry;


use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Credentials;
use crate::error::HttpError;
use crate::transport::{Method, Transport, TransportRequest, TransportResponse};

pub use registry::{ProbeRegistry, RegisteredProbe};

/// Variable holding the quotation id shared between quotation probes.
pub const QUOTATION_ID: &str = "quotation_id";

/// Everything a probe may use for one invocation. Built by the orchestrator.
pub struct ProbeContext<'ctx> {
    pub base_url: &'ctx str,
    /// Auth and content headers applied to every request.
    pub headers: &'ctx [(String, String)],
    pub transport: &'ctx dyn Transport,
    /// Values captured by earlier probes of the same worker.
    pub vars: &'ctx BTreeMap<String, String>,
    pub credentials: Option<&'ctx Credentials>,
}

impl ProbeContext<'_> {
    /// Sends a request to `path` below the base URL, with a JSON body when
    /// one is given.
    ///
    /// # Errors
    ///
    /// Returns the transport error when no response was obtained.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<TransportResponse, HttpError> {
        let mut headers = self.headers.to_vec();
        if body.is_some()
            && !headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        }
        let request = TransportRequest {
            method,
            url: format!("{}{}", self.base_url.trim_end_matches('/'), path),
            body: body.map(serde_json::Value::to_string),
            headers,
        };
        self.transport.send(request).await
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub duration_ms: f64,
    pub body: String,
}

impl From<TransportResponse> for ProbeResponse {
    fn from(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            duration_ms: response.duration_ms,
            body: response.body,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request completed but one or more checks did not hold.
    CheckFailure,
    /// No usable response: transport error, timeout or panic.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Success {
        response: ProbeResponse,
        credential: Option<Credential>,
        captures: BTreeMap<String, String>,
    },
    Skipped {
        reason: String,
    },
    Failure {
        kind: FailureKind,
        detail: String,
        response: Option<ProbeResponse>,
    },
}

impl ProbeResult {
    pub(crate) fn error(detail: impl Into<String>) -> Self {
        ProbeResult::Failure {
            kind: FailureKind::Error,
            detail: detail.into(),
            response: None,
        }
    }

    pub(crate) fn transport_error(err: &HttpError) -> Self {
        Self::error(err.to_string())
    }

    #[must_use]
    pub fn response(&self) -> Option<&ProbeResponse> {
        match self {
            ProbeResult::Success { response, .. } => Some(response),
            ProbeResult::Failure { response, .. } => response.as_ref(),
            ProbeResult::Skipped { .. } => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.response().map_or(0.0, |response| response.duration_ms)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// An API probe invoked with the worker's current auth headers.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult;
}

/// The probe that exchanges credentials for an access token.
///
/// Returns `Skipped` when no credentials are configured; a `Success` from a
/// login probe carries the credential.
#[async_trait]
pub trait LoginProbe: Send + Sync {
    async fn login(&self, ctx: &ProbeContext<'_>) -> ProbeResult;
}

/// Renders a JSON scalar id (string or number) as text.
pub(crate) fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(_)
        | serde_json::Value::Null
        | serde_json::Value::Bool(_)
        | serde_json::Value::Array(_)
        | serde_json::Value::Object(_) => None,
    }
}
