//! Egress geolocation through third-party IP services
//!
//! Providers are tried strictly in order; the first one that reports both a
//! country code and an IP wins. Failures are never fatal: an unresolved
//! result just means "unknown".

pub mod provider;
pub mod resolver;
pub mod user_agent;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use provider::{default_providers, GeoProvider, HttpGeoProvider, ParseError};
pub use resolver::{provider_timeout, GeoResolver};
pub use user_agent::UserAgent;

/// Country code and egress IP reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeoResult {
    /// ISO 3166-1 alpha-2 country code (e.g., "US", "CN")
    pub country_code: String,
    pub ip: String,
}

impl GeoResult {
    pub fn new(country_code: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ip: ip.into(),
        }
    }

    /// Both fields present
    pub fn is_resolved(&self) -> bool {
        !self.country_code.is_empty() && !self.ip.is_empty()
    }
}

impl fmt::Display for GeoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(f, "{} ({})", self.country_code, self.ip)
        } else {
            write!(f, "Unknown")
        }
    }
}
