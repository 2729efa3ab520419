//! HTTP GET provider.
//!
//! Each job's input is a URL. A job succeeds only on `200 OK`; any other
//! status is an application failure carrying the code. The body is always
//! read to the end before the status is judged, so connections go back to
//! the pool on every path.

use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use crate::batch::{FetchError, Fetcher};
use crate::{Result, WorkpoolError};

/// Successful HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Full response body
    pub body: Bytes,
}

/// [`Fetcher`] issuing one GET per job
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    /// Fetcher with a default client
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client, timeout: None }
    }

    /// Fetcher whose client aborts requests after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkpoolError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout: Some(timeout) })
    }

    /// Timeout carrying the configured limit. A client supplied through
    /// [`with_client`](Self::with_client) has no known limit, so its
    /// timeouts are reported as transport errors instead.
    fn timed_out(&self, err: &reqwest::Error) -> Option<FetchError> {
        match self.timeout {
            Some(limit) if err.is_timeout() => Some(FetchError::Timeout(limit)),
            _ => None,
        }
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        self.timed_out(&err)
            .unwrap_or_else(|| FetchError::Transport(err.to_string()))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    type Input = String;
    type Output = HttpResponse;

    async fn fetch(&self, url: &String) -> std::result::Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.timed_out(&e).unwrap_or_else(|| FetchError::Body(e.to_string())))?;

        if status != StatusCode::OK {
            return Err(FetchError::Status { code: status.as_u16() });
        }

        Ok(HttpResponse { status: status.as_u16(), body })
    }
}
