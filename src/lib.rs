//! Subcheck - Proxy Subscription Checker
//!
//! Checks proxy nodes for liveness, tags the live ones with the country they
//! egress through, and keeps a local sub-store sidecar in sync with the
//! resulting subscription.

pub mod config;
pub mod error;
pub mod geo;
pub mod proxy;
pub mod substore;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ProbeError, SyncError};
pub use geo::{GeoResolver, GeoResult};
pub use proxy::*;
pub use substore::{SubStoreClient, SubStoreSync, SyncReport};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
