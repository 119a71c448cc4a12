//! Runtime configuration shared by the checker and the sub-store sync

use std::time::Duration;

/// Default base timeout in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default URL used for liveness checks
const DEFAULT_ALIVE_TEST_URL: &str = "http://gstatic.com/generate_204";

/// Default number of geolocation rounds
const DEFAULT_SUB_URLS_RETRY: u32 = 3;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 10;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base timeout for outbound requests, in milliseconds
    pub timeout_ms: u64,
    /// URL probed through each node to decide liveness
    pub alive_test_url: String,
    /// How many times the geolocation provider list is retried
    pub sub_urls_retry: u32,
    /// Number of nodes checked concurrently
    pub concurrency: usize,
    /// Sub-store listen port; empty disables the sync
    pub sub_store_port: String,
    /// Optional path prefix of the sub-store API (e.g. "/backend")
    pub sub_store_path: String,
    /// Overwrite script URL referenced by the mihomo profile
    pub mihomo_overwrite_url: String,
    /// Prefix prepended to raw.githubusercontent.com URLs
    pub github_proxy: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            alive_test_url: DEFAULT_ALIVE_TEST_URL.to_string(),
            sub_urls_retry: DEFAULT_SUB_URLS_RETRY,
            concurrency: DEFAULT_CONCURRENCY,
            sub_store_port: String::new(),
            sub_store_path: String::new(),
            mihomo_overwrite_url: String::new(),
            github_proxy: String::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_alive_test_url(mut self, url: String) -> Self {
        self.alive_test_url = url;
        self
    }

    pub fn with_sub_urls_retry(mut self, retry: u32) -> Self {
        self.sub_urls_retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_sub_store(mut self, port: String, path: String) -> Self {
        self.sub_store_port = port;
        self.sub_store_path = path;
        self
    }

    pub fn with_mihomo_overwrite_url(mut self, url: String) -> Self {
        self.mihomo_overwrite_url = url;
        self
    }

    pub fn with_github_proxy(mut self, prefix: String) -> Self {
        self.github_proxy = prefix;
        self
    }

    /// Base timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a sub-store sidecar is configured at all
    pub fn sub_store_enabled(&self) -> bool {
        !self.sub_store_port.trim().is_empty()
    }

    /// Loopback base URL of the sub-store API.
    ///
    /// The sidecar may listen on a LAN address, but it is always reached via
    /// 127.0.0.1, so any host part of the configured port is dropped.
    pub fn sub_store_base_url(&self) -> String {
        let port = self
            .sub_store_port
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .trim();
        format!("http://127.0.0.1:{}{}", port, self.sub_store_path)
    }
}
