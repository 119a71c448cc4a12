//! Node probing
//!
//! This module provides functionality for:
//! - Parsing node lists (IP:PORT, IP:PORT:USER:PASS, scheme URLs)
//! - Liveness probing through a node with a timeout floor
//! - Checking many nodes concurrently and tagging live ones with their country

pub mod alive;
pub mod checker;
pub mod models;
pub mod parser;

pub use alive::{alive_timeout, AliveProbe};
pub use checker::ProxyChecker;
pub use models::{
    render_subscription, Proxy, ProxyAuth, ProxyCheckResult, ProxyCheckStatus, ProxyType,
};
pub use parser::ProxyParser;
