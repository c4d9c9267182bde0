//! Engine-specific error type.

use std::time::Duration;

use thiserror::Error;

/// Failure modes of a conversion engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine binary not found: {0}")]
    NotFound(String),

    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine reported failure: {0}")]
    Failed(String),

    #[error("engine produced no output: {0}")]
    EmptyOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert!(
            EngineError::NotFound("mutool".to_string())
                .to_string()
                .contains("mutool")
        );
        assert!(
            EngineError::Timeout(Duration::from_secs(3))
                .to_string()
                .contains("3s")
        );
    }
}
