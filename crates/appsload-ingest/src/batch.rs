//! Batch driver: resolve the input pattern and process every matching file

use crate::config::LoaderConfig;
use crate::processor::{self, FileError, FileOutcome, FileProcessor};
use crate::writer::{build_writer, BackendWriter};
use appsload_common::{LoadError, Result};
use futures::stream::{self, StreamExt};
use glob::MatchOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-run summary
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files read to the end and renamed
    pub outcomes: Vec<FileOutcome>,
    /// Files that could not be processed, with the reason
    pub failures: Vec<(PathBuf, FileError)>,
}

impl BatchReport {
    pub fn files_seen(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }

    /// Files whose verdict was a successful load
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict.is_success()).count()
    }

    pub fn records_processed(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stats.processed).sum()
    }

    pub fn record_errors(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stats.errors).sum()
    }
}

/// List pending files for `pattern`, sorted.
///
/// Done-marked (dot-prefixed) names and anything that is not a regular file
/// are skipped.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob::glob_with(pattern, options).map_err(|e| LoadError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() && !processor::is_done(&path) => files.push(path),
            Ok(_) => {},
            Err(e) => warn!(error = %e, "Unreadable path while matching pattern"),
        }
    }
    files.sort();
    Ok(files)
}

pub struct BatchDriver {
    processor: FileProcessor,
    workers: usize,
}

impl BatchDriver {
    pub fn new(processor: FileProcessor, workers: usize) -> Self {
        Self {
            processor,
            workers: workers.max(1),
        }
    }

    /// Wire up route table, writer and processor from a resolved config
    pub fn from_config(config: &LoaderConfig) -> Self {
        let routes = Arc::new(config.routes.clone());
        let writer: Arc<dyn BackendWriter> =
            build_writer(config.dry_run, &routes, config.memcache);
        let processor = FileProcessor::new(routes, writer).with_chunk_size(config.chunk_size);
        Self::new(processor, config.workers)
    }

    /// Process every file matching `pattern`. Only a bad pattern fails the
    /// run; per-file failures end up in the report.
    pub async fn run(&self, pattern: &str) -> Result<BatchReport> {
        let files = discover(pattern)?;
        if files.is_empty() {
            warn!(pattern, "No files for pattern");
            return Ok(BatchReport::default());
        }
        info!(pattern, files = files.len(), workers = self.workers, "Starting batch");

        let results: Vec<_> = stream::iter(files)
            .map(|path| async move {
                let result = self.processor.process(&path).await;
                (path, result)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "File not marked as done");
                    report.failures.push((path, e));
                },
            }
        }

        info!(
            files = report.files_seen(),
            successful = report.successful(),
            failed = report.failures.len(),
            processed = report.records_processed(),
            errors = report.record_errors(),
            "Batch finished"
        );
        Ok(report)
    }
}
