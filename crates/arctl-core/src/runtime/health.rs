//! Health gating for the primary service.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HealthPolicy {
    /// Polls that fit in the budget: one immediately, then one per interval
    /// until the deadline.
    pub fn max_polls(&self) -> u32 {
        if self.interval.is_zero() {
            return u32::MAX;
        }
        let whole = self.timeout.as_nanos() / self.interval.as_nanos();
        u32::try_from(whole).unwrap_or(u32::MAX).saturating_add(1)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("not healthy after {polls} checks over {waited:?}")]
    Timeout { polls: u32, waited: Duration },

    #[error("health wait cancelled after {polls} checks")]
    Cancelled { polls: u32 },
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// One health check; `true` when the service answered 200.
    async fn check(&self) -> bool;
}

/// Poll `probe` until it succeeds, the deadline passes, or `cancel` fires.
/// Returns the number of checks made.
pub async fn wait_healthy(
    probe: &dyn HealthProbe,
    policy: HealthPolicy,
    cancel: &CancellationToken,
) -> Result<u32, HealthError> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut polls = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(HealthError::Cancelled { polls });
        }

        polls += 1;
        if probe.check().await {
            tracing::debug!(polls, "health check passed");
            return Ok(polls);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(HealthError::Timeout {
                polls,
                waited: now - started,
            });
        }

        let pause = policy.interval.min(deadline - now);
        tokio::select! {
            () = cancel.cancelled() => return Err(HealthError::Cancelled { polls }),
            () = tokio::time::sleep(pause) => {}
        }
    }
}

/// HTTP GET probe; healthy on status 200.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::trace!(url = %self.url, error = %e, "health check failed");
                false
            }
        }
    }
}
