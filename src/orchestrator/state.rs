use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::catalog::Scene;
use crate::probe::FailureKind;

/// One failed test invocation, kept for the error-log artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: String,
    pub scene: Scene,
    pub test: String,
    pub kind: FailureKind,
    pub http_status: Option<u16>,
    pub body_excerpt: Option<String>,
    pub message: String,
    pub vu_id: u64,
    pub iteration: u64,
}

/// State shared by every worker of a run. Only ever appended to.
#[derive(Debug, Default)]
pub struct RunState {
    error_log: Mutex<Vec<ErrorLogEntry>>,
    reported_check_failures: Mutex<HashSet<(Scene, String)>>,
    reauth_count: AtomicU64,
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: ErrorLogEntry) {
        self.error_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    #[must_use]
    pub fn error_log(&self) -> Vec<ErrorLogEntry> {
        self.error_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True the first time a check failure is seen for `(scene, test)`.
    #[must_use]
    pub fn first_check_failure(&self, scene: Scene, test: &str) -> bool {
        self.reported_check_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((scene, test.to_owned()))
    }

    pub fn record_reauth(&self) {
        self.reauth_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn reauth_count(&self) -> u64 {
        self.reauth_count.load(Ordering::Relaxed)
    }
}
