//! Larder Scoring - Recipe similarity and recommendation scoring
//!
//! Pure functions over already-loaded recipes:
//! - `similarity_score`: symmetric recipe-to-recipe similarity
//! - `context_score`: how well a recipe fits a user's preferences and season
//! - `match_factors` / `context_factors`: explainable per-signal breakdowns
//! - `rank_similar` / `rank_recommendations`: top-N ranking over a candidate pool
//!
//! Every score is clamped to `[0, 1]`.

pub mod context;
pub mod error;
pub mod rank;
pub mod score;

pub use context::*;
pub use error::*;
pub use rank::*;
pub use score::*;
