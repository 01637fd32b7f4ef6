//! Shared helpers for appsload integration tests
//!
//! - gzip fixture writers
//! - [`RecordingWriter`], an in-memory [`BackendWriter`] that can be told to
//!   fail specific keys
//! - [`FakeMemcached`], a local TCP server speaking just enough of the
//!   memcached text protocol for `set`

#![allow(dead_code)]

use appsload_ingest::routing::{EndpointId, RouteTable};
use appsload_ingest::writer::{BackendWriter, WriteError};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

// ============================================================================
// Fixtures
// ============================================================================

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

/// Write `lines` newline-joined and gzipped to `dir/name`
pub fn write_gz<S: AsRef<str>>(dir: &Path, name: &str, lines: &[S]) -> PathBuf {
    let content: String = lines
        .iter()
        .map(|line| format!("{}\n", line.as_ref()))
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, gzip(content.as_bytes())).unwrap();
    path
}

pub fn valid_lines(device_type: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{device_type}\tdev{i:05}\t55.55\t42.42\t{},{},{}", i, i + 1, i + 2))
        .collect()
}

pub fn done_path(path: &Path) -> PathBuf {
    let name = path.file_name().unwrap().to_string_lossy();
    path.with_file_name(format!(".{name}"))
}

pub fn routes() -> RouteTable {
    RouteTable::builder()
        .route("idfa", "127.0.0.1:33013")
        .route("gaid", "127.0.0.1:33014")
        .route("adid", "127.0.0.1:33015")
        .route("dvid", "127.0.0.1:33016")
        .build()
        .unwrap()
}

// ============================================================================
// RecordingWriter
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub endpoint: EndpointId,
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingWriter {
    writes: Mutex<Vec<RecordedWrite>>,
    fail_keys: HashSet<String>,
}

impl RecordingWriter {
    pub fn failing<I: IntoIterator<Item = S>, S: Into<String>>(keys: I) -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendWriter for RecordingWriter {
    async fn write(&self, endpoint: &EndpointId, key: &str, value: &[u8]) -> Result<(), WriteError> {
        if self.fail_keys.contains(key) {
            return Err(WriteError::Rejected("SERVER_ERROR out of memory".to_string()));
        }
        self.writes.lock().unwrap().push(RecordedWrite {
            endpoint: endpoint.clone(),
            key: key.to_string(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// FakeMemcached
// ============================================================================

/// How the fake server answers a `set`
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Stored,
    NotStored,
    ClientError,
    /// Read the command, never answer
    Silent,
}

pub struct FakeMemcached {
    pub addr: SocketAddr,
    stored: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeMemcached {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stored = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let server_stored = stored.clone();
        let server_connections = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                server_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, reply, server_stored.clone()));
            }
        });

        Self {
            addr,
            stored,
            connections,
        }
    }

    pub fn endpoint(&self) -> EndpointId {
        EndpointId::new(self.addr.to_string())
    }

    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.stored.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(
    socket: tokio::net::TcpStream,
    reply: Reply,
    stored: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
) {
    let mut socket = BufReader::new(socket);
    loop {
        let mut header = String::new();
        match socket.read_line(&mut header).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {},
        }

        // set <key> <flags> <exptime> <bytes>
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 5 || parts[0] != "set" {
            let _ = socket.get_mut().write_all(b"ERROR\r\n").await;
            continue;
        }
        let len: usize = parts[4].parse().unwrap();
        let mut data = vec![0u8; len + 2];
        if socket.read_exact(&mut data).await.is_err() {
            return;
        }
        data.truncate(len);

        let answer: &[u8] = match reply {
            Reply::Stored => {
                stored.lock().unwrap().push((parts[1].to_string(), data));
                b"STORED\r\n"
            },
            Reply::NotStored => b"NOT_STORED\r\n",
            Reply::ClientError => b"CLIENT_ERROR bad data chunk\r\n",
            Reply::Silent => continue,
        };
        if socket.get_mut().write_all(answer).await.is_err() {
            return;
        }
    }
}
