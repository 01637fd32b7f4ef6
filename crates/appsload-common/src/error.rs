//! Error types shared across appsload crates

use thiserror::Error;

/// Result type alias for appsload operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Run-level error type.
///
/// Per-line and per-file failures have their own types in `appsload-ingest`;
/// this one covers what ends a whole invocation.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid file pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Envelope self-check failed: {0}")]
    SelfCheck(String),
}

impl LoadError {
    pub fn config(message: impl Into<String>) -> Self {
        LoadError::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_error_message() {
        let err = LoadError::Pattern {
            pattern: "/data/[*.gz".to_string(),
            message: "invalid range pattern".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid file pattern `/data/[*.gz`: invalid range pattern"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: LoadError = io.into();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
