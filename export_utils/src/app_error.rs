//! Error types for size-limited production
//!
//! Precondition violations in the search are panics and never reach these
//! types. Cleanup failures are logged and swallowed. What is left is encode
//! failures and filesystem failures, both fatal for the current export.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProduceError<E>
where
    E: std::error::Error + 'static,
{
    /// The encoder failed; the whole export is abandoned.
    #[error("encode at quality {quality:.4} failed: {source}")]
    Encode {
        quality: f64,
        #[source]
        source: E,
    },

    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl<E> ProduceError<E>
where
    E: std::error::Error + 'static,
{
    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ProduceError::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_encode_failure(&self) -> bool {
        matches!(self, ProduceError::Encode { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            ProduceError::Encode { quality, source } => {
                format!("❌ Encoding failed at quality {:.4}: {}", quality, source)
            }
            ProduceError::Io {
                operation,
                path,
                source,
            } => format!(
                "❌ Failed to {}: {}\n   File: {}",
                operation,
                source,
                path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_encode_error_message() {
        let err: ProduceError<Boom> = ProduceError::Encode {
            quality: 0.5,
            source: Boom,
        };
        assert!(err.is_encode_failure());
        assert_eq!(err.to_string(), "encode at quality 0.5000 failed: boom");
        assert!(err.user_message().contains("quality 0.5000"));
    }

    #[test]
    fn test_io_error_message_includes_path() {
        let err: ProduceError<Boom> = ProduceError::io(
            "create trial artifact in",
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_encode_failure());
        assert_eq!(
            err.to_string(),
            "failed to create trial artifact in /tmp/missing: gone"
        );
        assert!(err.user_message().contains("File: /tmp/missing"));
    }
}
