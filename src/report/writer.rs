use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AppError, AppResult, ReportError};

use super::Reports;

/// Paths of the artifacts written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub html: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
    pub error_log: Option<PathBuf>,
}

/// Writes the rendered reports into `dir`, creating it when missing.
/// `<base>_errors.json` is only written when the run logged errors.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or a file cannot
/// be written.
pub async fn write_reports(dir: &Path, reports: &Reports) -> AppResult<WrittenReports> {
    tokio::fs::create_dir_all(dir).await.map_err(|err| {
        AppError::report(ReportError::CreateDir {
            path: dir.to_path_buf(),
            source: err,
        })
    })?;

    let base = &reports.base_name;
    let html = dir.join(format!("{}.html", base));
    let csv = dir.join(format!("{}.csv", base));
    let json = dir.join(format!("{}.json", base));
    write_artifact(&html, &reports.html).await?;
    write_artifact(&csv, &reports.csv).await?;
    write_artifact(&json, &reports.json).await?;

    let error_log = match reports.error_log.as_deref() {
        Some(content) => {
            let path = dir.join(format!("{}_errors.json", base));
            write_artifact(&path, content).await?;
            Some(path)
        }
        None => None,
    };

    info!("Reports written to {}.", dir.display());
    Ok(WrittenReports {
        html,
        csv,
        json,
        error_log,
    })
}

async fn write_artifact(path: &Path, content: &str) -> AppResult<()> {
    tokio::fs::write(path, content).await.map_err(|err| {
        AppError::report(ReportError::WriteArtifact {
            path: path.to_path_buf(),
            source: err,
        })
    })
}
