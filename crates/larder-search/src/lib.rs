//! Larder Search - Recipe search, ranking and recommendation
//!
//! This crate provides:
//! - The query model (`SearchQuery`, `SearchFilters`, `SortOption`)
//! - A query compiler targeting an aggregation pipeline or a full-text query
//! - Two interchangeable backends behind `SearchBackend`: an aggregation
//!   store and a Tantivy index
//! - Whole-field match highlighting and bounded facet aggregation
//! - Fire-and-forget performance and analytics instrumentation
//! - `SearchOrchestrator`, the entry point tying it all together

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod facets;
pub mod highlight;
pub mod instrument;
pub mod orchestrator;
pub mod pipeline;
pub mod query;

pub use backend::*;
pub use compiler::*;
pub use config::*;
pub use error::*;
pub use facets::*;
pub use highlight::*;
pub use instrument::*;
pub use orchestrator::*;
pub use pipeline::*;
pub use query::*;
