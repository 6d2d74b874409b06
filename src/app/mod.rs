//! Run assembly: resolving CLI/config input and executing a load test.
mod list;
mod run;


pub use list::render_listing;
pub use run::{DEFAULT_REPORTS_DIR, ResolvedRun, RunOutcome, resolve_run, run_load_test};
