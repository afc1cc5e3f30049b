//! Larder Core - Recipe document types shared by every Larder crate
//!
//! This crate defines the documents the search engine operates on:
//! - `Recipe`: A recipe as stored in the catalog and indexed by the backends
//! - `RecipeId`: Stable identifier for a recipe
//! - `Difficulty` and `Season`: Closed vocabularies used for filtering and scoring

pub mod error;
pub mod recipe;

pub use error::*;
pub use recipe::*;
