//! Report generation: summary text, HTML, CSV, JSON and the error log.
mod csv;
mod format;
mod html;
mod naming;
mod summary;
mod writer;


use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;

use crate::catalog::Scene;
use crate::config::TestSetting;
use crate::error::{AppError, AppResult, ReportError};
use crate::metrics::MetricsSnapshot;
use crate::orchestrator::ErrorLogEntry;

pub use format::CustomDisplay;
pub use naming::{report_base_name, selection_name};
pub use writer::{WrittenReports, write_reports};

/// Descriptive data about a run. Everything is fixed at setup except the
/// end time, which is set once when the run finishes.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub scene: Scene,
    pub test_name: String,
    pub test_setting: TestSetting,
    pub environment: String,
    pub test_start_time: String,
    test_end_time: Option<String>,
}

impl RunMetadata {
    #[must_use]
    pub fn new(
        scene: Scene,
        test_name: String,
        test_setting: TestSetting,
        environment: String,
        started_at: &DateTime<Local>,
    ) -> Self {
        Self {
            scene,
            test_name,
            test_setting,
            environment,
            test_start_time: timestamp(started_at),
            test_end_time: None,
        }
    }

    /// Records the end of the run. Returns `false` when it was already set.
    pub fn finish(&mut self, ended_at: &DateTime<Local>) -> bool {
        if self.test_end_time.is_some() {
            return false;
        }
        self.test_end_time = Some(timestamp(ended_at));
        true
    }

    #[must_use]
    pub fn test_end_time(&self) -> Option<&str> {
        self.test_end_time.as_deref()
    }
}

fn timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Rendered artifacts of one run, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reports {
    pub base_name: String,
    pub summary: String,
    pub html: String,
    pub csv: String,
    pub json: String,
    /// Present only when the run logged at least one error.
    pub error_log: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'ctx> {
    metadata: &'ctx RunMetadata,
    #[serde(flatten)]
    snapshot: &'ctx MetricsSnapshot,
}

/// Renders every report artifact for a finished run.
///
/// # Errors
///
/// Returns an error when a document cannot be rendered or serialized.
pub fn generate_reports(
    snapshot: &MetricsSnapshot,
    metadata: &RunMetadata,
    error_log: &[ErrorLogEntry],
    generated_at: &DateTime<Local>,
) -> AppResult<Reports> {
    let generated = timestamp(generated_at);
    let json = serde_json::to_string_pretty(&JsonReport { metadata, snapshot }).map_err(|err| {
        AppError::report(ReportError::Serialize {
            artifact: "json report",
            source: err,
        })
    })?;
    let error_json = if error_log.is_empty() {
        None
    } else {
        Some(serde_json::to_string_pretty(error_log).map_err(|err| {
            AppError::report(ReportError::Serialize {
                artifact: "error log",
                source: err,
            })
        })?)
    };

    Ok(Reports {
        base_name: report_base_name(
            &metadata.environment,
            generated_at,
            metadata.scene,
            &metadata.test_name,
        ),
        summary: summary::render(snapshot, metadata, &generated)?,
        html: html::render(snapshot, metadata, error_log, &generated)?,
        csv: csv::render(snapshot, metadata, &generated),
        json,
        error_log: error_json,
    })
}
