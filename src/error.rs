//! Error types for loading, cleaning, linking and checkpointing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of an [`Error`], used by callers that only care
/// whether a failure was bad input, an out-of-range frame, a bad setting,
/// or a filesystem problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed input row.
    Format,
    /// A frame index outside the supported range, or a frame with no ellipse.
    Range,
    /// An invalid configuration value.
    Config,
    /// An unreadable or unwritable file.
    Resource,
}

/// Errors produced by the linking pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed row at line {line}: {reason}")]
    Format { line: u64, reason: String },

    #[error("Frame {frame} exceeds the frame index limit {limit}")]
    FrameOutOfRange { frame: u32, limit: u32 },

    #[error("No moon ellipse for frame {frame}")]
    MissingEllipse { frame: u32 },

    #[error("Ellipse table is not dense: expected frame {expected}, got {actual}")]
    EllipseGap { expected: u32, actual: u32 },

    #[error("Invalid configuration value for '{field}': {reason}")]
    Config { field: &'static str, reason: String },

    #[error("I/O failure on '{path}': {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Corrupt checkpoint '{path}': {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format { .. } => ErrorKind::Format,
            Error::FrameOutOfRange { .. } | Error::MissingEllipse { .. } | Error::EllipseGap { .. } => {
                ErrorKind::Range
            }
            Error::Config { .. } => ErrorKind::Config,
            Error::Resource { .. } | Error::Csv { .. } | Error::CorruptCheckpoint { .. } => {
                ErrorKind::Resource
            }
        }
    }

    pub(crate) fn format(line: u64, reason: impl Into<String>) -> Self {
        Error::Format {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Config {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Resource {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = Error::format(12, "expected 4 or 6 columns, got 3");
        assert_eq!(
            err.to_string(),
            "Malformed row at line 12: expected 4 or 6 columns, got 3"
        );
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_range_errors_classify_together() {
        let a = Error::FrameOutOfRange {
            frame: 70000,
            limit: 65535,
        };
        let b = Error::MissingEllipse { frame: 3 };
        let c = Error::EllipseGap {
            expected: 4,
            actual: 6,
        };
        assert_eq!(a.kind(), ErrorKind::Range);
        assert_eq!(b.kind(), ErrorKind::Range);
        assert_eq!(c.kind(), ErrorKind::Range);
        assert_eq!(
            a.to_string(),
            "Frame 70000 exceeds the frame index limit 65535"
        );
    }

    #[test]
    fn test_resource_error_keeps_source() {
        use std::error::Error as _;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = Error::resource("/tmp/none.csv", io_err);
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/none.csv"));
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::config("chunk_frames", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'chunk_frames': must be > 0"
        );
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
