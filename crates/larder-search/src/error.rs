//! Error types for larder-search

use larder_core::RecipeId;
use larder_scoring::ScoringError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Recipe not found: {0}")]
    NotFound(RecipeId),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Analytics error: {0}")]
    Analytics(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        SearchError::Validation(message.into())
    }

    pub fn database(message: impl std::fmt::Display) -> Self {
        SearchError::Database(message.to_string())
    }

    /// Whether the caller caused this error (4xx-class) rather than the engine (5xx-class)
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::Validation(_) | SearchError::NotFound(_))
    }

    /// HTTP-style status class for route handlers
    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::Validation(_) => 400,
            SearchError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(e: tantivy::TantivyError) -> Self {
        SearchError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes_are_distinct() {
        let validation = SearchError::validation("page must be >= 1");
        let backend = SearchError::database("connection reset");

        assert!(validation.is_client_error());
        assert_eq!(validation.status_code(), 400);
        assert!(!backend.is_client_error());
        assert_eq!(backend.status_code(), 500);
        assert_eq!(SearchError::NotFound(RecipeId::new()).status_code(), 404);
    }

    #[test]
    fn test_scoring_error_is_server_class() {
        let err: SearchError = ScoringError::failed("context score", "bad rating").into();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("context score"));
    }
}
