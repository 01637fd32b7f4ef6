//! Completion policy: decides whether a fully read file counts as a
//! successful load.
//!
//! The verdict only changes what gets logged. Every file that reaches this
//! point is renamed to its done-name whatever the verdict.

/// Highest acceptable `errors / processed` ratio, exclusive
pub const NORMAL_ERR_RATE: f64 = 0.01;

/// Per-file counters, owned by one processor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRunStats {
    /// Records written successfully
    pub processed: u64,
    /// Lines that failed to parse, route or write
    pub errors: u64,
    /// App ids coerced to 0 across all parsed records
    pub coerced_apps: u64,
    /// Parsed records with an unparsable coordinate
    pub invalid_coords: u64,
}

impl FileRunStats {
    /// `None` when nothing was processed
    pub fn error_rate(&self) -> Option<f64> {
        (self.processed > 0).then(|| self.errors as f64 / self.processed as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Nothing was written, whatever the error count
    NothingProcessed,
    Acceptable { error_rate: f64 },
    ErrorRateTooHigh { error_rate: f64 },
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Acceptable { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionPolicy {
    max_error_rate: f64,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            max_error_rate: NORMAL_ERR_RATE,
        }
    }
}

impl CompletionPolicy {
    pub fn max_error_rate(&self) -> f64 {
        self.max_error_rate
    }

    pub fn evaluate(&self, stats: &FileRunStats) -> Verdict {
        match stats.error_rate() {
            None => Verdict::NothingProcessed,
            Some(error_rate) if error_rate < self.max_error_rate => Verdict::Acceptable { error_rate },
            Some(error_rate) => Verdict::ErrorRateTooHigh { error_rate },
        }
    }
}
