//! Error types for digest operations.

use std::path::PathBuf;

/// Errors raised while fingerprinting dependencies or reading build state.
///
/// A dependency path that does not exist is never an error; it is reported
/// as absent by the extractor and skipped by the digester.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// A path expected to be readable could not be stat'ed or enumerated.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A member filter pattern could not be compiled.
    #[error("invalid member pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as given by the user.
        pattern: String,
        /// The underlying glob error.
        source: globset::Error,
    },

    /// Persisted build state could not be written.
    #[error("build state error at {path}: {reason}")]
    State {
        /// The state file or directory.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },
}

impl DigestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DigestError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = DigestError::io(
            "/out/lib.jar",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("/out/lib.jar"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_state_error_display() {
        let err = DigestError::State {
            path: PathBuf::from(".cpdigest/inputs.jsonl"),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
