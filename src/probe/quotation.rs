use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Local, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::transport::Method;

use super::checks::{CheckSet, object_without_error};
use super::homepage::prerequisite_failure;
use super::{FailureKind, Probe, ProbeContext, ProbeResult, QUOTATION_ID, json_id};

const MYWORK_STATUSES: [&str; 16] = [
    "Draft",
    "SubmitToSSP",
    "SubmitToUW",
    "NeedMoreInformation",
    "DiscountApprovalSubmitted",
    "DiscountApprovalRejected",
    "ClosedLost",
    "Deleted",
    "Cancelled",
    "QuotationExpired",
    "QuotationIssued",
    "ClosedWon",
    "PendingPolicyIssue",
    "PolicyIssued",
    "NotUsed",
    "AppFormSubmitted",
];

const MYTEAM_STATUSES: [&str; 10] = [
    "Draft",
    "SubmitToSSP",
    "SubmitToUW",
    "NeedMoreInformation",
    "DiscountApprovalSubmitted",
    "DiscountApprovalApproved",
    "DiscountApprovalRejected",
    "PendingPolicyIssue",
    "AppFormSubmitted",
    "SubmitToDP",
];

#[derive(Debug, Clone, Copy)]
pub(crate) enum ListKind {
    MyWork,
    MyTeam,
}

impl ListKind {
    const fn request_type(self) -> &'static str {
        match self {
            ListKind::MyWork => "MyWork",
            ListKind::MyTeam => "MyTeam",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            ListKind::MyWork => "quotation mywork list",
            ListKind::MyTeam => "quotation myteam list",
        }
    }

    const fn statuses(self) -> &'static [&'static str] {
        match self {
            ListKind::MyWork => &MYWORK_STATUSES,
            ListKind::MyTeam => &MYTEAM_STATUSES,
        }
    }
}

/// `POST /quotation/requests/list`, gated on the homepage prerequisites.
/// Captures the first listed quotation id.
pub(crate) struct ListQuotations {
    pub(crate) kind: ListKind,
}

#[async_trait]
impl Probe for ListQuotations {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        if let Some(failure) = prerequisite_failure(ctx).await {
            return prerequisite_result(failure, self.kind.label());
        }

        let payload = json!({
            "type": self.kind.request_type(),
            "status": self.kind.statuses(),
            "createDate": {},
            "updateDate": {},
            "page": 1,
            "pageSize": 20,
            "sort": {},
        });
        let response = match ctx
            .send(Method::Post, "/quotation/requests/list", Some(&payload))
            .await
        {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };

        let label = self.kind.label();
        let mut checks = CheckSet::new(response.into());
        checks.status_in(&format!("{} status is 200", label), &[200]);
        checks.faster_than(&format!("{} response time < 5s", label), 5000.0);
        checks.has_body(&format!("{} has body", label));
        checks.valid_json(&format!("{} valid JSON", label));
        checks.json_check(&format!("{} has data structure", label), |json| {
            json.pointer("/data/data").is_some_and(Value::is_array)
        });
        checks.json_check(&format!("{} error is false", label), |json| {
            json.get("error") == Some(&Value::Bool(false))
        });

        let mut captures = BTreeMap::new();
        if let Some(id) = checks
            .json()
            .and_then(|json| json.pointer("/data/data/0/id"))
            .and_then(json_id)
        {
            captures.insert(QUOTATION_ID.to_owned(), id);
        }
        checks.finish(captures)
    }
}

/// A failed prerequisite fails the list probe with the prerequisite's
/// response, so an expired token still surfaces as a 401.
fn prerequisite_result(failure: ProbeResult, label: &str) -> ProbeResult {
    match failure {
        ProbeResult::Failure {
            kind,
            detail,
            response,
        } => ProbeResult::Failure {
            kind,
            detail: format!("prerequisite for {} failed: {}", label, detail),
            response,
        },
        ProbeResult::Skipped { reason } => ProbeResult::Skipped { reason },
        ProbeResult::Success { response, .. } => ProbeResult::Failure {
            kind: FailureKind::CheckFailure,
            detail: format!("prerequisite for {} failed", label),
            response: Some(response),
        },
    }
}

fn missing_quotation_id() -> ProbeResult {
    ProbeResult::Failure {
        kind: FailureKind::CheckFailure,
        detail: "no quotation id available".to_owned(),
        response: None,
    }
}

/// `GET /quotation/detail/{id}` for the captured quotation id.
pub(crate) struct QuotationDetail;

#[async_trait]
impl Probe for QuotationDetail {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        let Some(id) = ctx.var(QUOTATION_ID) else {
            return missing_quotation_id();
        };
        let path = format!("/quotation/detail/{}", id);
        let response = match ctx.send(Method::Get, &path, None).await {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };

        let mut checks = CheckSet::new(response.into());
        checks.status_in("quotation detail status is 200", &[200]);
        checks.faster_than("quotation detail response time < 3s", 3000.0);
        checks.has_body("quotation detail has body");
        checks.json_check("quotation detail valid JSON", object_without_error);
        checks.json_check("quotation detail has correct ID", |json| {
            json.pointer("/data/id").and_then(json_id).as_deref() == Some(id)
        });
        checks.finish(BTreeMap::new())
    }
}

/// `POST /quotation/save`; captures the id of the created quotation.
pub(crate) struct CreateQuotation;

#[async_trait]
impl Probe for CreateQuotation {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        let payload = json!({
            "title": format!("Test Quotation {}", Local::now().timestamp_millis()),
            "description": "Load test quotation",
            "items": [
                { "name": "Test Item 1", "quantity": 2, "price": 100.0 },
                { "name": "Test Item 2", "quantity": 1, "price": 250.5 },
            ],
        });
        let response = match ctx.send(Method::Post, "/quotation/save", Some(&payload)).await {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };

        let mut checks = CheckSet::new(response.into());
        checks.status_in("create quotation status is 201 or 200", &[200, 201]);
        checks.faster_than("create quotation response time < 5s", 5000.0);
        checks.has_body("create quotation has body");
        checks.json_check("create quotation valid JSON", Value::is_object);

        let mut captures = BTreeMap::new();
        if let Some(id) = checks
            .json()
            .and_then(|json| json.pointer("/data/id"))
            .and_then(json_id)
        {
            captures.insert(QUOTATION_ID.to_owned(), id);
        }
        checks.finish(captures)
    }
}

/// `POST /quotation/submit-request` for the captured quotation id.
pub(crate) struct SubmitQuotation;

#[async_trait]
impl Probe for SubmitQuotation {
    async fn execute(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        let Some(id) = ctx.var(QUOTATION_ID) else {
            return missing_quotation_id();
        };
        let payload = json!({
            "quotationId": id,
            "notes": "Load test submission",
            "urgency": "normal",
            "submittedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let response = match ctx
            .send(Method::Post, "/quotation/submit-request", Some(&payload))
            .await
        {
            Ok(response) => response,
            Err(err) => return ProbeResult::transport_error(&err),
        };

        let mut checks = CheckSet::new(response.into());
        checks.status_in("submit quotation status is 200", &[200]);
        checks.faster_than("submit quotation response time < 5s", 5000.0);
        checks.has_body("submit quotation has body");
        checks.json_check("submit quotation valid JSON", object_without_error);
        checks.json_check("submit quotation success message", |json| {
            json.get("message")
                .and_then(Value::as_str)
                .is_some_and(|message| message.to_lowercase().contains("success"))
        });
        checks.finish(BTreeMap::new())
    }
}
