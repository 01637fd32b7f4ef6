//! Memcached text-protocol writer
//!
//! Each endpoint from the route table gets its own small pool of idle TCP
//! connections. A write checks out a connection (or dials a new one), sends a
//! single `set <key> 0 0 <len>` command and waits for `STORED`. Connections
//! that saw an I/O error or a timeout are dropped instead of being pooled.

use super::{BackendWriter, WriteError};
use crate::routing::{EndpointId, RouteTable};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// memcached refuses longer keys
pub const MAX_KEY_LEN: usize = 250;

const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_MAX_IDLE: usize = 4;

/// Client settings shared by every endpoint pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemcacheSettings {
    /// Socket timeout for connect and for each set round-trip
    pub timeout_ms: u64,
    /// Idle connections kept per endpoint
    pub max_idle: usize,
}

impl Default for MemcacheSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

impl MemcacheSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Check a key against memcached's text-protocol rules
pub fn validate_key(key: &str) -> Result<(), WriteError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b > b' ' && b != 0x7f);
    if valid {
        Ok(())
    } else {
        Err(WriteError::InvalidKey(key.to_string()))
    }
}

/// Whether the connection can serve another command after a non-`STORED`
/// reply. `ERROR` and `CLIENT_ERROR` may leave unread payload bytes behind.
fn reply_keeps_stream_in_sync(reply: &str) -> bool {
    reply == "NOT_STORED" || reply == "EXISTS" || reply.starts_with("SERVER_ERROR")
}

struct Connection {
    stream: BufReader<TcpStream>,
}

impl Connection {
    async fn connect(addr: &EndpointId) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WriteError> {
        let header = format!("set {} 0 0 {}\r\n", key, value.len());
        let mut request = Vec::with_capacity(header.len() + value.len() + 2);
        request.extend_from_slice(header.as_bytes());
        request.extend_from_slice(value);
        request.extend_from_slice(b"\r\n");

        let socket = self.stream.get_mut();
        socket.write_all(&request).await?;
        socket.flush().await?;

        let mut reply = String::new();
        if self.stream.read_line(&mut reply).await? == 0 {
            return Err(WriteError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before reply",
            )));
        }

        match reply.trim_end() {
            "STORED" => Ok(()),
            other => Err(WriteError::Rejected(other.to_string())),
        }
    }
}

struct EndpointPool {
    endpoint: EndpointId,
    idle: Mutex<Vec<Connection>>,
}

impl EndpointPool {
    fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            idle: Mutex::new(Vec::new()),
        }
    }

    async fn checkout(&self, timeout: Duration) -> Result<Connection, WriteError> {
        if let Some(conn) = self.idle.lock().await.pop() {
            return Ok(conn);
        }

        debug!(endpoint = %self.endpoint, "Opening memcache connection");
        match tokio::time::timeout(timeout, Connection::connect(&self.endpoint)).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(WriteError::Timeout(timeout)),
        }
    }

    async fn checkin(&self, conn: Connection, max_idle: usize) {
        let mut idle = self.idle.lock().await;
        if idle.len() < max_idle {
            idle.push(conn);
        }
    }
}

/// Live writer: one memcached `set` per call, no retries
pub struct MemcacheWriter {
    pools: HashMap<EndpointId, EndpointPool>,
    settings: MemcacheSettings,
}

impl MemcacheWriter {
    /// One pool per distinct endpoint in `routes`. No connection is opened
    /// until the first write.
    pub fn new(routes: &RouteTable, settings: MemcacheSettings) -> Self {
        let pools = routes
            .endpoints()
            .into_iter()
            .map(|endpoint| (endpoint.clone(), EndpointPool::new(endpoint)))
            .collect();
        Self { pools, settings }
    }
}

#[async_trait]
impl BackendWriter for MemcacheWriter {
    async fn write(&self, endpoint: &EndpointId, key: &str, value: &[u8]) -> Result<(), WriteError> {
        validate_key(key)?;

        let pool = self
            .pools
            .get(endpoint)
            .ok_or_else(|| WriteError::UnknownEndpoint(endpoint.clone()))?;

        let timeout = self.settings.timeout();
        let mut conn = pool.checkout(timeout).await?;

        let result = match tokio::time::timeout(timeout, conn.set(key, value)).await {
            Ok(result) => result,
            Err(_) => Err(WriteError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                trace!(endpoint = %endpoint, key, bytes = value.len(), "Stored");
                pool.checkin(conn, self.settings.max_idle).await;
                Ok(())
            },
            Err(WriteError::Rejected(reply)) => {
                if reply_keeps_stream_in_sync(&reply) {
                    pool.checkin(conn, self.settings.max_idle).await;
                }
                warn!(endpoint = %endpoint, key, reply = %reply, "Cannot write to memc");
                Err(WriteError::Rejected(reply))
            },
            Err(e) => {
                warn!(endpoint = %endpoint, key, error = %e, "Cannot write to memc");
                Err(e)
            },
        }
    }

    fn mode(&self) -> &'static str {
        "memcache"
    }
}
