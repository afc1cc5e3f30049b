//! Error types for larder-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),

    #[error("Invalid season: {0}")]
    InvalidSeason(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
