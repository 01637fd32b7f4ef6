//! Backend writers
//!
//! A [`BackendWriter`] accepts one key/value pair for one endpoint and reports
//! the outcome. Live and dry-run mode are separate implementations picked once
//! at startup by [`build_writer`], so the live path carries no dry-run checks.
//!
//! - [`MemcacheWriter`]: one memcached `set` per call over pooled connections
//! - [`DryRunWriter`]: no network I/O, logs the would-be write at `debug`

pub mod memcache;

use crate::envelope;
use crate::routing::{EndpointId, RouteTable};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use memcache::{MemcacheSettings, MemcacheWriter};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Backend rejected the write: {0}")]
    Rejected(String),

    #[error("Invalid key `{0}`")]
    InvalidKey(String),

    #[error("No connection pool for endpoint {0}")]
    UnknownEndpoint(EndpointId),
}

/// Capability: store `value` under `key` on `endpoint`.
///
/// One call is one logical write; implementations never retry.
#[async_trait]
pub trait BackendWriter: Send + Sync {
    async fn write(&self, endpoint: &EndpointId, key: &str, value: &[u8]) -> Result<(), WriteError>;

    /// Short name for log lines
    fn mode(&self) -> &'static str;
}

/// Writer that only reports what it would have written
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunWriter;

#[async_trait]
impl BackendWriter for DryRunWriter {
    async fn write(&self, endpoint: &EndpointId, key: &str, value: &[u8]) -> Result<(), WriteError> {
        match envelope::decode(value) {
            Ok(apps) => debug!("{} - {} -> {}", endpoint, key, apps),
            Err(e) => debug!("{} - {} -> <{} undecodable bytes: {}>", endpoint, key, value.len(), e),
        }
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "dry-run"
    }
}

/// Pick the writer strategy for this run
pub fn build_writer(
    dry_run: bool,
    routes: &RouteTable,
    settings: MemcacheSettings,
) -> Arc<dyn BackendWriter> {
    if dry_run {
        Arc::new(DryRunWriter)
    } else {
        Arc::new(MemcacheWriter::new(routes, settings))
    }
}
