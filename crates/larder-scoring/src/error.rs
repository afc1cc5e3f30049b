//! Error types for larder-scoring

use thiserror::Error;

/// Names of the scoring operations, carried by `ScoringError`
pub mod operations {
    pub const SIMILARITY_SCORE: &str = "similarity score";
    pub const MATCH_FACTORS: &str = "match factors";
    pub const CONTEXT_SCORE: &str = "context score";
    pub const CONTEXT_FACTORS: &str = "context factors";
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Failed to compute {operation}: {reason}")]
    Failed {
        operation: &'static str,
        reason: String,
    },
}

impl ScoringError {
    pub fn failed(operation: &'static str, reason: impl Into<String>) -> Self {
        ScoringError::Failed {
            operation,
            reason: reason.into(),
        }
    }

    /// The operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            ScoringError::Failed { operation, .. } => operation,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;
