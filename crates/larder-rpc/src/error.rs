//! Error types for larder-rpc

use jsonrpsee::types::ErrorObjectOwned;
use larder_search::SearchError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Search backend error")]
    Backend,

    #[error("Scoring error")]
    Scoring,

    #[error("Internal error")]
    Internal,
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidParams(_) => -32602,
            RpcError::NotFound(_) => -32004,
            RpcError::Backend => -32001,
            RpcError::Scoring => -32002,
            RpcError::Internal => -32603,
        }
    }

    /// Whether the caller can fix the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, RpcError::InvalidParams(_) | RpcError::NotFound(_))
    }
}

/// Client-class errors keep their message; server-class errors are reduced
/// to a generic one and only logged on the server.
impl From<&SearchError> for RpcError {
    fn from(e: &SearchError) -> Self {
        match e {
            SearchError::Validation(message) => RpcError::InvalidParams(message.clone()),
            SearchError::NotFound(id) => RpcError::NotFound(format!("recipe {}", id)),
            SearchError::Database(_) => RpcError::Backend,
            SearchError::Scoring(_) => RpcError::Scoring,
            SearchError::Analytics(_) | SearchError::Config(_) | SearchError::Io(_) | SearchError::Json(_) => {
                RpcError::Internal
            }
        }
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(e: RpcError) -> Self {
        ErrorObjectOwned::owned(e.code(), e.to_string(), None::<()>)
    }
}

/// Convert an engine error into a JSON-RPC error object
pub fn to_rpc_error(e: SearchError) -> ErrorObjectOwned {
    RpcError::from(&e).into()
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::RecipeId;

    #[test]
    fn test_codes() {
        let invalid = to_rpc_error(SearchError::validation("page must be a positive integer"));
        assert_eq!(invalid.code(), -32602);
        assert!(invalid.message().contains("page must be"));

        let missing = to_rpc_error(SearchError::NotFound(RecipeId::new()));
        assert_eq!(missing.code(), -32004);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let backend = to_rpc_error(SearchError::database("password=hunter2 connection refused"));
        assert_eq!(backend.code(), -32001);
        assert!(!backend.message().contains("hunter2"));

        let analytics = RpcError::from(&SearchError::Analytics("sink".into()));
        assert_eq!(analytics.code(), -32603);
        assert!(!analytics.is_client_error());
    }
}
