//! Error types for larder-store

use larder_core::RecipeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Recipe not found: {0}")]
    RecipeNotFound(RecipeId),

    #[error("Catalog already exists at path: {0}")]
    CatalogExists(String),

    #[error("Invalid catalog path: {0}")]
    InvalidPath(String),

    #[error("Invalid recipe data: {0}")]
    InvalidRecipe(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
