use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::HttpError;
use crate::metrics::{MetricsRecorder, names};

use super::{Transport, TransportRequest, TransportResponse};

/// Records `http_reqs`, `http_req_duration` and `http_req_failed` for every
/// request passing through the wrapped transport.
///
/// A request counts as failed when it produced no response or the status is
/// outside 200..=399.
pub struct MeteredTransport {
    inner: Arc<dyn Transport>,
    recorder: Arc<MetricsRecorder>,
}

impl MeteredTransport {
    #[must_use]
    pub fn new(inner: Arc<dyn Transport>, recorder: Arc<MetricsRecorder>) -> Self {
        Self { inner, recorder }
    }
}

#[async_trait]
impl Transport for MeteredTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let start = Instant::now();
        let result = self.inner.send(request).await;

        let (duration_ms, failed) = match result.as_ref() {
            Ok(response) => (
                response.duration_ms,
                !(200..=399).contains(&response.status),
            ),
            Err(_) => (start.elapsed().as_secs_f64() * 1000.0, true),
        };
        self.recorder.add_counter(names::HTTP_REQS, 1.0);
        self.recorder.add_trend(names::HTTP_REQ_DURATION, duration_ms);
        self.recorder.add_rate(names::HTTP_REQ_FAILED, failed);

        result
    }
}
