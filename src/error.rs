//! Error types for the workboard engine.
//!
//! - `StoreError`: the persistence collaborator failed or refused a write
//! - `OracleError`: a planning or risk oracle failed or returned a malformed response
//! - `EngineError`: what every operation on the interaction surface returns

use std::path::PathBuf;

/// Persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed database {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode database: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing service could not be reached or rejected the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        StoreError::NotFound { kind, id }
    }
}

/// Oracle failure.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

/// Main engine error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Input rejected before any persistence call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Persistence call failed.
    #[error(transparent)]
    Remote(#[from] StoreError),

    /// Oracle call failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Some items of a batch failed; the succeeded ones are kept.
    #[error("only {succeeded} of {requested} items succeeded")]
    PartialBatch { succeeded: usize, requested: usize },
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Whether the error came back from a collaborator rather than from input checks.
    pub fn is_remote(&self) -> bool {
        matches!(self, EngineError::Remote(_) | EngineError::Oracle(_))
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_batch_reports_counts() {
        let e = EngineError::PartialBatch { succeeded: 2, requested: 3 };
        assert_eq!(e.to_string(), "only 2 of 3 items succeeded");
        assert!(!e.is_remote());
    }

    #[test]
    fn store_errors_convert_to_remote() {
        let e: EngineError = StoreError::not_found("task", 7).into();
        assert!(e.is_remote());
        assert_eq!(e.to_string(), "task 7 not found");
    }
}
