//! Per-file processing
//!
//! A file moves through three states:
//!
//! 1. **Start**: open it and read the gzip header. A failure here leaves the
//!    file untouched so the next run picks it up again.
//! 2. **Reading**: a blocking reader task decompresses the file and hands
//!    chunks of raw lines over a bounded channel to the async loop, which
//!    parses, routes and writes each record and owns the [`FileRunStats`].
//! 3. **Done**: the [`CompletionPolicy`] verdict is logged and the file is
//!    renamed to `.<name>` so the discovery pattern no longer matches it.

pub mod policy;

pub use policy::{CompletionPolicy, FileRunStats, Verdict, NORMAL_ERR_RATE};

use crate::envelope;
use crate::record;
use crate::routing::RouteTable;
use crate::writer::BackendWriter;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Lines handed from the reader to the processing loop at a time
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// Chunks buffered between reader and processing loop
const CHANNEL_CAPACITY: usize = 4;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Marker prefix of a processed file
pub const DONE_PREFIX: char = '.';

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot decompress {}: {source}", path.display())]
    Decompression {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot rename {} to {}: {source}", path.display(), target.display())]
    Rename {
        path: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },
}

/// Result of a file that was read to the end
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub done_path: PathBuf,
    pub stats: FileRunStats,
    pub verdict: Verdict,
}

/// Drives one input file from open to rename
pub struct FileProcessor {
    routes: Arc<RouteTable>,
    writer: Arc<dyn BackendWriter>,
    policy: CompletionPolicy,
    chunk_size: usize,
}

impl FileProcessor {
    pub fn new(routes: Arc<RouteTable>, writer: Arc<dyn BackendWriter>) -> Self {
        Self {
            routes,
            writer,
            policy: CompletionPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub async fn process(&self, path: &Path) -> Result<FileOutcome, FileError> {
        info!(path = %path.display(), writer = self.writer.mode(), "Processing");

        let start_path = path.to_path_buf();
        let reader = tokio::task::spawn_blocking(move || open_gzip(&start_path))
            .await
            .map_err(|e| FileError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })??;

        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let chunk_size = self.chunk_size;
        let reader_task = tokio::task::spawn_blocking(move || read_chunks(reader, tx, chunk_size));

        let mut stats = FileRunStats::default();
        while let Some(chunk) = rx.recv().await {
            for line in chunk {
                self.process_line(&line, &mut stats).await;
            }
        }

        // All lines are accounted for once the reader has finished cleanly.
        let read_result = match reader_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        };
        if let Err(source) = read_result {
            return Err(FileError::Decompression {
                path: path.to_path_buf(),
                source,
            });
        }

        let verdict = self.policy.evaluate(&stats);
        self.log_verdict(path, &stats, verdict);

        let done_path = mark_done(path).await?;

        Ok(FileOutcome {
            path: path.to_path_buf(),
            done_path,
            stats,
            verdict,
        })
    }

    async fn process_line(&self, raw: &[u8], stats: &mut FileRunStats) {
        // tabs included: a trailing empty column does not count as a field
        let line = raw.trim_ascii();
        if line.is_empty() {
            return;
        }

        let record = match record::parse_bytes(line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Skipping line");
                stats.errors += 1;
                return;
            },
        };
        stats.coerced_apps += record.coerced_apps as u64;
        if record.invalid_coords {
            stats.invalid_coords += 1;
        }

        let endpoint = match self.routes.lookup(&record.device_type) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!("{}", e);
                stats.errors += 1;
                return;
            },
        };

        let value = envelope::encode(&record);
        match self.writer.write(endpoint, &record.key(), &value).await {
            Ok(()) => stats.processed += 1,
            Err(_) => stats.errors += 1,
        }
    }

    fn log_verdict(&self, path: &Path, stats: &FileRunStats, verdict: Verdict) {
        let path = path.display();
        match verdict {
            Verdict::NothingProcessed => error!(
                %path,
                errors = stats.errors,
                "Nothing was loaded. Failed load"
            ),
            Verdict::Acceptable { error_rate } => info!(
                %path,
                processed = stats.processed,
                errors = stats.errors,
                "Acceptable error rate ({}). Successful load",
                error_rate
            ),
            Verdict::ErrorRateTooHigh { error_rate } => error!(
                %path,
                processed = stats.processed,
                errors = stats.errors,
                "High error rate ({} > {}). Failed load",
                error_rate,
                self.policy.max_error_rate()
            ),
        }

        if stats.coerced_apps > 0 || stats.invalid_coords > 0 {
            warn!(
                %path,
                coerced_apps = stats.coerced_apps,
                invalid_coords = stats.invalid_coords,
                "Loaded records contained coerced values"
            );
        }
    }
}

/// Open the file and make the decoder parse the first gzip header.
///
/// Concatenated members (`cat a.gz b.gz`) are read through to the last one.
fn open_gzip(path: &Path) -> Result<BufReader<MultiGzDecoder<File>>, FileError> {
    let file = File::open(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, MultiGzDecoder::new(file));
    reader.fill_buf().map_err(|source| FileError::Decompression {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(reader)
}

/// Blocking side of the pipeline. Stops early, without error, if the
/// receiving loop has gone away.
fn read_chunks<R: BufRead>(
    mut reader: R,
    tx: mpsc::Sender<Vec<Vec<u8>>>,
    chunk_size: usize,
) -> std::io::Result<()> {
    let mut chunk = Vec::with_capacity(chunk_size);

    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        chunk.push(line);

        if chunk.len() >= chunk_size {
            let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
            if tx.blocking_send(full).is_err() {
                return Ok(());
            }
        }
    }

    if !chunk.is_empty() {
        let _ = tx.blocking_send(chunk);
    }
    Ok(())
}

/// `<dir>/<name>` -> `<dir>/.<name>`
pub fn done_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!("{DONE_PREFIX}{name}")))
}

/// Whether the file name already carries the done marker
pub fn is_done(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(DONE_PREFIX))
        .unwrap_or(false)
}

async fn mark_done(path: &Path) -> Result<PathBuf, FileError> {
    let target = done_path(path).ok_or_else(|| FileError::Rename {
        path: path.to_path_buf(),
        target: PathBuf::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;

    tokio::fs::rename(path, &target)
        .await
        .map_err(|source| FileError::Rename {
            path: path.to_path_buf(),
            target: target.clone(),
            source,
        })?;

    debug!(from = %path.display(), to = %target.display(), "Marked as done");
    Ok(target)
}
