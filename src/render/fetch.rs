//! Remote applet download

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;
use thiserror::Error;

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status
    #[error("{status} {reason}")]
    Status { status: u16, reason: String },

    #[error("content size at {url} over limit: {limit}")]
    TooLarge { url: String, limit: u64 },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Downloads applet source text
#[async_trait]
pub trait AppletFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed fetcher with a response size cap
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_size: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_size: config.max_size,
        })
    }
}

#[async_trait]
impl AppletFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "text/plain")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_size,
        };

        if response.content_length().is_some_and(|len| len > self.max_size) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let received = u64::try_from(body.len() + chunk.len()).unwrap_or(u64::MAX);
            if received > self.max_size {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
