use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AppResult;

use super::vu::{DriverShared, Vu};

/// Runs `vus` VUs back to back for `duration`.
pub(super) async fn run(shared: Arc<DriverShared>, vus: u64, duration: Duration) -> AppResult<()> {
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..vus {
        let vu = Vu::new(&shared);
        handles.push(tokio::spawn(vu.run_until(start, duration, None)));
    }
    for handle in handles {
        handle.await?;
    }
    Ok(())
}
