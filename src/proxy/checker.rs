//! Node checker: liveness first, then geolocation for the live ones

use crate::config::Config;
use crate::error::ProbeError;
use crate::geo::GeoResolver;
use crate::proxy::alive::AliveProbe;
use crate::proxy::models::{Proxy, ProxyCheckResult};
use crate::Result;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Checks nodes by routing probe traffic through each of them
#[derive(Clone)]
pub struct ProxyChecker {
    probe: AliveProbe,
    geo: GeoResolver,
    concurrency: usize,
    timeout_ms: u64,
}

impl ProxyChecker {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            AliveProbe::new(config.alive_test_url.clone(), config.timeout_ms),
            GeoResolver::from_config(config),
            config,
        )
    }

    /// Checker with a custom probe and resolver
    pub fn with_parts(probe: AliveProbe, geo: GeoResolver, config: &Config) -> Self {
        Self {
            probe,
            geo,
            concurrency: config.concurrency.max(1),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Check a single node
    #[instrument(skip(self, proxy), fields(proxy = %proxy))]
    pub async fn check_proxy(&self, proxy: &Proxy) -> ProxyCheckResult {
        let client = match self.create_client(proxy) {
            Ok(client) => client,
            Err(e) => return ProxyCheckResult::dead(proxy.clone(), e.to_string()),
        };

        let start = Instant::now();
        match self.probe.is_alive(&client, None).await {
            Ok(true) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let geo = self.geo.resolve(&client).await;
                debug!(latency_ms, geo = %geo, "Node alive");
                ProxyCheckResult::alive(proxy.clone(), latency_ms, geo)
            }
            Ok(false) => ProxyCheckResult::dead(proxy.clone(), "non-2xx response from alive test URL"),
            Err(ProbeError::Timeout(_)) => ProxyCheckResult::timeout(proxy.clone()),
            Err(e) => {
                debug!("Node dead: {}", e);
                ProxyCheckResult::dead(proxy.clone(), e.to_string())
            }
        }
    }

    /// Check many nodes with bounded concurrency
    pub async fn check_proxies(&self, proxies: Vec<Proxy>) -> Vec<ProxyCheckResult> {
        let total = proxies.len();
        let results: Vec<ProxyCheckResult> = stream::iter(proxies)
            .map(|proxy| {
                let checker = self.clone();
                async move { checker.check_proxy(&proxy).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let alive = results.iter().filter(|r| r.is_alive()).count();
        info!("Checked {} nodes: {} alive, {} dead", total, alive, total - alive);
        results
    }

    /// Check nodes and split them into alive and dead
    pub async fn check_and_separate(
        &self,
        proxies: Vec<Proxy>,
    ) -> (Vec<ProxyCheckResult>, Vec<ProxyCheckResult>) {
        self.check_proxies(proxies)
            .await
            .into_iter()
            .partition(ProxyCheckResult::is_alive)
    }

    /// Client whose traffic goes through `proxy`
    fn create_client(&self, proxy: &Proxy) -> Result<Client> {
        let client = Client::builder()
            .proxy(ReqwestProxy::all(proxy.url())?)
            .connect_timeout(std::time::Duration::from_millis(self.timeout_ms.max(1000)))
            .build()?;

        Ok(client)
    }
}
