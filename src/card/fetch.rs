use crate::models::NearestEpisode;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("An error occurred while fetching the data (status {status})")]
    Status { status: u16, info: Value },
    #[error("network failure: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 404 means "nothing to show", which no amount of retrying changes.
    fn is_retryable(&self) -> bool {
        self.status() != Some(404)
    }
}

#[async_trait]
pub trait EpisodeSource: Send + Sync {
    async fn fetch(&self) -> Result<NearestEpisode, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEpisodeSource {
    client: Client,
    url: String,
}

impl HttpEpisodeSource {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let user_agent = format!("episode-viewer/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EpisodeSource for HttpEpisodeSource {
    async fn fetch(&self) -> Result<NearestEpisode, FetchError> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if !status.is_success() {
            let info = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::Object(Default::default()));
            return Err(FetchError::Status {
                status: status.as_u16(),
                info,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// One attempt plus up to `policy.max_retries` more, `policy.delay` apart.
pub async fn fetch_with_retry(
    source: &dyn EpisodeSource,
    policy: &RetryPolicy,
) -> Result<NearestEpisode, FetchError> {
    let mut attempt = 0;
    loop {
        match source.fetch().await {
            Ok(episode) => return Ok(episode),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    "Fetch failed ({}), retry {}/{} in {:?}",
                    e, attempt, policy.max_retries, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                debug!("Fetch settled with error after {} retries: {}", attempt, e);
                return Err(e);
            }
        }
    }
}
