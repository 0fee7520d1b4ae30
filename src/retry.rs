//! Retry for remote API calls.
//!
//! Both remotes get the same policy: a transient failure (rate limit, 5xx,
//! network) is retried after the delay the server advertised, or a configured
//! default when it didn't advertise one. By default that happens exactly once;
//! a second failure is returned to the caller. Permanent failures are never
//! retried.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Whether a remote failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limits, server errors and network failures.
    Transient,
    /// Everything else. Needs a human or a code change.
    Permanent,
}

impl ErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// An error from a remote API, classified for retry decisions.
pub trait RemoteError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    /// Delay advertised by the server (`Retry-After`), if any.
    fn retry_after(&self) -> Option<Duration>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Delay used when the server doesn't advertise one.
    pub default_delay: Duration,

    /// Upper bound on any advertised delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    pub const DEFAULT: Self = Self {
        max_retries: 1,
        default_delay: Duration::from_secs(5),
        max_delay: Duration::from_secs(60),
    };

    /// Never retry.
    pub const NONE: Self = Self {
        max_retries: 0,
        default_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    pub fn with_default_delay(default_delay: Duration) -> Self {
        Self {
            default_delay,
            ..Self::DEFAULT
        }
    }

    /// The delay to wait given what the server advertised.
    pub fn delay_for(&self, advertised: Option<Duration>) -> Duration {
        advertised
            .unwrap_or(self.default_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation`, retrying transient failures per `config`.
pub async fn retry_transient<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    E: RemoteError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind().is_retriable() && retries < config.max_retries => {
                let delay = config.delay_for(e.retry_after());
                warn!(
                    retry = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient remote error, retrying"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
