//! Liveness probing through a candidate node

use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;

use crate::error::ProbeError;

/// Minimum time a liveness check is given when the caller sets no deadline
const MIN_ALIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout used when the caller did not bind a deadline
pub fn alive_timeout(base_ms: u64) -> Duration {
    Duration::from_millis(base_ms).max(MIN_ALIVE_TIMEOUT)
}

/// Single-shot liveness probe against a test URL
#[derive(Debug, Clone)]
pub struct AliveProbe {
    test_url: String,
    timeout: Duration,
}

impl AliveProbe {
    pub fn new(test_url: impl Into<String>, base_timeout_ms: u64) -> Self {
        Self {
            test_url: test_url.into(),
            timeout: alive_timeout(base_timeout_ms),
        }
    }

    pub fn test_url(&self) -> &str {
        &self.test_url
    }

    /// Timeout applied when no deadline is supplied
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET the test URL through `client`.
    ///
    /// `Ok(true)` for any 2xx, `Ok(false)` for other statuses. A caller
    /// `deadline` replaces the built-in timeout and is never extended.
    /// No retries.
    pub async fn is_alive(&self, client: &Client, deadline: Option<Instant>) -> Result<bool, ProbeError> {
        let deadline = deadline.unwrap_or_else(|| Instant::now() + self.timeout);
        let budget = deadline.saturating_duration_since(Instant::now());

        let response = tokio::time::timeout_at(deadline, client.get(&self.test_url).send())
            .await
            .map_err(|_| ProbeError::Timeout(budget))??;

        Ok(response.status().is_success())
    }
}
