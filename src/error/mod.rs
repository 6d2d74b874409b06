mod app;
mod config;
mod http;
mod metrics;
mod report;
mod run;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use http::HttpError;
pub use metrics::MetricsError;
pub use report::ReportError;
pub use run::{RegistryError, RunError, SelectionError};
pub use validation::ValidationError;
