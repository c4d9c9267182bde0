//! Error types for Tahweel.
//!
//! All fallible operations in the crate return [`Result`]. The taxonomy
//! follows the propagation policy of the pipeline:
//!
//! - `Io` (from `std::io::Error`) bubbles up unchanged — storage problems
//!   abort the request that hit them.
//! - `Validation` / `UnsupportedFormat` are client faults and terminate only
//!   the offending request.
//! - `Engine` carries the identity of the engine that failed so callers can
//!   retry with the alternative.
//! - `NoEngineAvailable` signals service misconfiguration (no usable engine
//!   was found at startup).
//! - `Cache` and `PostProcess` are best-effort concerns: the orchestrator
//!   logs and swallows them, they never cross the API boundary.

use thiserror::Error;

/// Result type alias using `TahweelError`.
pub type Result<T> = std::result::Result<T, TahweelError>;

/// Main error type for all Tahweel operations.
#[derive(Debug, Error)]
pub enum TahweelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Engine '{engine}' failed: {source}")]
    Engine {
        engine: String,
        #[source]
        source: crate::engine::EngineError,
    },

    #[error("No conversion engine is available")]
    NoEngineAvailable,

    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Post-processing error: {message}")]
    PostProcess {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0}")]
    Other(String),
}

impl TahweelError {
    /// Create a Validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Cache error.
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Cache error with source.
    pub fn cache_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a PostProcess error.
    pub fn post_process<S: Into<String>>(message: S) -> Self {
        Self::PostProcess {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Serialization error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an engine failure together with the identity of the engine that ran.
    pub fn engine_failure<S: Into<String>>(engine: S, source: crate::engine::EngineError) -> Self {
        Self::Engine {
            engine: engine.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for TahweelError {
    fn from(err: serde_json::Error) -> Self {
        TahweelError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<rmp_serde::encode::Error> for TahweelError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        TahweelError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<rmp_serde::decode::Error> for TahweelError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        TahweelError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TahweelError = io_err.into();
        assert!(matches!(err, TahweelError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_validation_error() {
        let err = TahweelError::validation("empty submission");
        assert_eq!(err.to_string(), "Validation error: empty submission");
    }

    #[test]
    fn test_unsupported_format_error() {
        let err = TahweelError::UnsupportedFormat("exe".to_string());
        assert_eq!(err.to_string(), "Unsupported format: exe");
    }

    #[test]
    fn test_engine_failure_carries_identity() {
        let source = crate::engine::EngineError::Failed("bad page tree".to_string());
        let err = TahweelError::engine_failure("standard", source);
        assert!(err.to_string().contains("standard"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cache_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "cannot write");
        let err = TahweelError::cache_with_source("cache write failed", source);
        assert_eq!(err.to_string(), "Cache error: cache write failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_no_engine_available_message() {
        let err = TahweelError::NoEngineAvailable;
        assert_eq!(err.to_string(), "No conversion engine is available");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TahweelError = json_err.into();
        assert!(matches!(err, TahweelError::Serialization { .. }));
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        fn read_file() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/tahweel.txt")?;
            Ok(content)
        }

        let result = read_file();
        assert!(matches!(result.unwrap_err(), TahweelError::Io(_)));
    }
}
