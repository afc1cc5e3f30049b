//! Larder Store - File-based recipe catalog
//!
//! This crate provides:
//! - A catalog directory with a manifest and one JSON file per recipe
//! - Bulk import of recipe JSON
//! - Loading the whole catalog for indexing

pub mod catalog;
pub mod error;

pub use catalog::*;
pub use error::*;
