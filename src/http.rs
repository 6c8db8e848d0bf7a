//! HTTP access shared by the catalog, the frame archive and the preview service.
//!
//! [`HttpClient`] wraps a pooled [`reqwest::Client`] with a per-call timeout and a bounded
//! retry loop. Only transport failures (see [`GalaxyError::is_transport`]) are retried; the
//! delay starts at `retry_backoff` and doubles after each failed attempt.
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::{params::GalaxyParams, GalaxyError};

const USER_AGENT: &str = concat!("gmag/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    pub fn new(params: &GalaxyParams) -> Result<Self, GalaxyError> {
        let client = reqwest::Client::builder()
            .timeout(params.request_timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| GalaxyError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(HttpClient {
            client,
            max_retries: params.max_retries,
            retry_backoff: params.retry_backoff,
        })
    }

    /// GET `url` with the given query parameters and return the response body.
    pub async fn get_bytes(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, GalaxyError> {
        let mut delay = self.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.get_once(url, query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transport() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(url, attempt, error = %e, "HTTP request failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// GET `url` and decode the body as UTF-8 text.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, GalaxyError> {
        let body = self.get_bytes(url, query).await?;
        String::from_utf8(body).map_err(|e| {
            GalaxyError::MalformedResponse(format!("non UTF-8 body from {url}: {e}"))
        })
    }

    async fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, GalaxyError> {
        trace!(url, "HTTP GET request starting");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "HTTP response received");
        if !status.is_success() {
            return Err(GalaxyError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| classify(url, e))?;
        trace!(url, bytes = bytes.len(), "HTTP response body read");
        Ok(bytes.to_vec())
    }
}

fn classify(url: &str, e: reqwest::Error) -> GalaxyError {
    if e.is_timeout() {
        GalaxyError::Timeout(url.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        GalaxyError::Transport(format!("{url}: {e}"))
    } else {
        GalaxyError::ReqwestError(e)
    }
}
