mod pagination;
mod routes;

pub use pagination::{next_page_url, Page, Paginator};
pub use routes::ApiRoutes;

use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::config::CrawlConfig;
use crate::error::{CiStreamError, Result};

/// CircleCI API client with a bounded-attempt retry policy.
///
/// One pooled `reqwest::Client` is shared read-only by every concurrent
/// crawl stage; the retry loop owns no state beyond its attempt counter.
pub struct CircleCiClient {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CircleCiClient {
    pub fn new(token: Option<&Token>, crawl: &CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("cistream/0.2.0"));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token.as_str())
                .map_err(|e| CiStreamError::Config(format!("Invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static("circle-token"), value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(crawl.request_timeout())
            .build()
            .map_err(|e| CiStreamError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_attempts: crawl.max_attempts.max(1),
            retry_delay: crawl.retry_delay(),
        })
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Transport failures are retried; a body that fails to decode is fatal
    /// and never retried.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.send_with_retry(url.clone()).await?;

        serde_json::from_str(&body).map_err(|source| CiStreamError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Issue a GET, retrying on any transport error or non-2xx status.
    ///
    /// Any failure counts against the attempt budget; no distinction is made
    /// between retryable and non-retryable statuses. Delay grows linearly
    /// with the attempt number.
    async fn send_with_retry(&self, url: Url) -> Result<String> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let reason = match self.client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => format!("failed to read response body: {e}"),
                    }
                }
                Ok(response) => describe_status(response.status()),
                Err(e) => format!("network error: {e}"),
            };

            if attempt >= self.max_attempts {
                return Err(CiStreamError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.retry_delay * attempt;
            warn!(
                "GET {url} failed ({reason}), retrying in {}ms ({attempt}/{})...",
                delay.as_millis(),
                self.max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn describe_status(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}
