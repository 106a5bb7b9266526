use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::UpstreamSettings;
use crate::error::{PipelineError, Result};

/// Bounded retry with exponential backoff around a single outbound call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &UpstreamSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            ..Self::default()
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent. Exhausted transient failures are reported as
    /// `UpstreamUnavailable` for `service`.
    pub async fn run<T, F, Fut>(&self, service: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        let mut backoff = self.initial_backoff;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= self.max_retries {
                        return Err(match err {
                            PipelineError::UpstreamUnavailable { .. } => err,
                            other => PipelineError::unavailable(
                                service,
                                format!("gave up after {} attempt(s): {other}", attempt + 1),
                            ),
                        });
                    }
                    tracing::warn!(service, attempt, error = %err, "retrying upstream call");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
