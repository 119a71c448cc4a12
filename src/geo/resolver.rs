//! Ordered geo provider waterfall

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::geo::provider::{default_providers, GeoProvider};
use crate::geo::GeoResult;

/// Lower bound of the per-provider timeout
const MIN_PROVIDER_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound of the per-provider timeout
const MAX_PROVIDER_TIMEOUT: Duration = Duration::from_secs(8);

/// Per-provider timeout derived from the configured base timeout
pub fn provider_timeout(base_ms: u64) -> Duration {
    Duration::from_millis(base_ms).clamp(MIN_PROVIDER_TIMEOUT, MAX_PROVIDER_TIMEOUT)
}

/// Resolves a client's egress country by trying providers in priority order
#[derive(Clone)]
pub struct GeoResolver {
    providers: Vec<Arc<dyn GeoProvider>>,
    rounds: u32,
    timeout: Duration,
}

impl GeoResolver {
    /// Resolver over the built-in provider list
    pub fn new(base_timeout_ms: u64, rounds: u32) -> Self {
        let providers = default_providers()
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn GeoProvider>)
            .collect();
        Self::with_providers(providers, base_timeout_ms, rounds)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.timeout_ms, config.sub_urls_retry)
    }

    /// Resolver over a custom provider list, tried in the given order
    pub fn with_providers(
        providers: Vec<Arc<dyn GeoProvider>>,
        base_timeout_ms: u64,
        rounds: u32,
    ) -> Self {
        Self {
            providers,
            rounds: rounds.max(1),
            timeout: provider_timeout(base_timeout_ms),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the country and IP `client` egresses through.
    ///
    /// Returns an unresolved result once every round is exhausted.
    pub async fn resolve(&self, client: &Client) -> GeoResult {
        self.resolve_until(client, None).await
    }

    /// Like [`resolve`](Self::resolve), but no request outlives `deadline`.
    pub async fn resolve_until(&self, client: &Client, deadline: Option<Instant>) -> GeoResult {
        for round in 1..=self.rounds {
            for provider in &self.providers {
                let timeout = match deadline {
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            debug!("Geo deadline reached in round {}", round);
                            return GeoResult::default();
                        }
                        remaining.min(self.timeout)
                    }
                    None => self.timeout,
                };

                let geo = provider.locate(client, timeout).await;
                if geo.is_resolved() {
                    debug!(provider = provider.name(), round, country = %geo.country_code, "Geo resolved");
                    return geo;
                }
            }
            debug!("All geo providers failed in round {}/{}", round, self.rounds);
        }

        GeoResult::default()
    }
}
