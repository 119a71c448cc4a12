//! Sub-store sidecar synchronization
//!
//! This module provides:
//! - Models for the managed `sub` subscription and `mihomo` profile
//! - A REST client with existence-check retries
//! - The reconciler that creates or updates both resources
//! - Overwrite URL rewriting (date placeholders, GitHub proxy)

pub mod client;
pub mod models;
pub mod sync;
pub mod url;

pub use client::{Presence, Resource, SubStoreClient};
pub use models::{ProfileResource, SubResource, MIHOMO_NAME, SUB_NAME};
pub use sync::{ResourceAction, SubStoreSync, SyncReport};
pub use url::rewrite;
