use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;

use crate::error::HttpError;

use super::{Method, Transport, TransportRequest, TransportResponse};

const USER_AGENT: &str = concat!("loadscene/", env!("CARGO_PKG_VERSION"));

/// `reqwest` backed transport; the timeout comes from the environment config.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds the shared client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| HttpError::BuildClientFailed { source: err })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let url = reqwest::Url::parse(&request.url).map_err(|err| HttpError::InvalidUrl {
            url: request.url.clone(),
            source: err,
        })?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(&request.url, err))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| HttpError::ReadBodyFailed {
                url: request.url.clone(),
                source: err,
            })?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
