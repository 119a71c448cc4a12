//! Node and check-result models

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::GeoResult;

/// Node scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyType::Http),
            "https" => Some(ProxyType::Https),
            "socks4" => Some(ProxyType::Socks4),
            "socks5" => Some(ProxyType::Socks5),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks4 => "socks4",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// A candidate node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16, proxy_type: ProxyType) -> Self {
        Self {
            host: host.into(),
            port,
            proxy_type,
            auth: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// `scheme://[user:pass@]host:port`
    pub fn url(&self) -> String {
        match &self.auth {
            Some(auth) => format!(
                "{}://{}:{}@{}:{}",
                self.proxy_type, auth.username, auth.password, self.host, self.port
            ),
            None => format!("{}://{}:{}", self.proxy_type, self.host, self.port),
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.proxy_type, self.host, self.port)
    }
}

/// Outcome of probing one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyCheckStatus {
    Alive,
    Dead(String),
    Timeout,
}

/// Probe result, tagged with the node's egress location when alive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCheckResult {
    pub proxy: Proxy,
    pub status: ProxyCheckStatus,
    pub latency_ms: Option<u64>,
    pub geo: GeoResult,
}

impl ProxyCheckResult {
    pub fn alive(proxy: Proxy, latency_ms: u64, geo: GeoResult) -> Self {
        Self {
            proxy,
            status: ProxyCheckStatus::Alive,
            latency_ms: Some(latency_ms),
            geo,
        }
    }

    pub fn dead(proxy: Proxy, reason: impl Into<String>) -> Self {
        Self {
            proxy,
            status: ProxyCheckStatus::Dead(reason.into()),
            latency_ms: None,
            geo: GeoResult::default(),
        }
    }

    pub fn timeout(proxy: Proxy) -> Self {
        Self {
            proxy,
            status: ProxyCheckStatus::Timeout,
            latency_ms: None,
            geo: GeoResult::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == ProxyCheckStatus::Alive
    }

    /// Country tag used as display name, `UNKNOWN` when unresolved
    pub fn country_tag(&self) -> &str {
        if self.geo.is_resolved() {
            &self.geo.country_code
        } else {
            "UNKNOWN"
        }
    }

    /// Node URL with the country tag as fragment
    pub fn subscription_line(&self) -> String {
        format!("{}#{}", self.proxy.url(), self.country_tag())
    }
}

/// Serialize the live nodes into the raw list pushed to the sidecar
pub fn render_subscription(results: &[ProxyCheckResult]) -> String {
    results
        .iter()
        .filter(|r| r.is_alive())
        .map(ProxyCheckResult::subscription_line)
        .collect::<Vec<_>>()
        .join("\n")
}
