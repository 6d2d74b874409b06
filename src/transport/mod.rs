//! Request/response capability consumed by probes.
mod metered;
mod reqwest_transport;


use std::fmt;

use async_trait::async_trait;

use crate::error::HttpError;

pub use metered::MeteredTransport;
pub use reqwest_transport::ReqwestTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration_ms: f64,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and waits for the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error when no response could be obtained (connect failure,
    /// timeout, unreadable body).
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpError>;
}
