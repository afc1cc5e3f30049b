//! Top-N ranking over a candidate pool

use std::cmp::Ordering;

use larder_core::Recipe;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{MatchFactors, RecommendationContext};
use crate::error::Result;
use crate::score::{context_factors, context_score, similarity_score};

/// A recipe with its similarity to some target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    pub score: f64,
}

/// A recommended recipe with its score and the factors behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recipe: Recipe,
    pub score: f64,
    pub factors: MatchFactors,
}

/// Rank candidates by similarity to `target`.
///
/// The target itself is skipped. Ties are broken by recipe id so the ranking
/// is deterministic.
pub fn rank_similar(target: &Recipe, candidates: &[Recipe], limit: usize) -> Result<Vec<ScoredRecipe>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter().filter(|c| c.id != target.id) {
        let score = similarity_score(target, candidate)?;
        scored.push(ScoredRecipe {
            recipe: candidate.clone(),
            score,
        });
    }

    scored.sort_by(|a, b| by_score_then_id(a.score, &a.recipe, b.score, &b.recipe));
    scored.truncate(limit);

    debug!(
        "Ranked {} similar recipes for {} from {} candidates",
        scored.len(),
        target.id,
        candidates.len()
    );
    Ok(scored)
}

/// Rank candidates by context score, skipping anything already in the history.
pub fn rank_recommendations(
    candidates: &[Recipe],
    context: &RecommendationContext,
    limit: usize,
) -> Result<Vec<Recommendation>> {
    let already_cooked = |recipe: &Recipe| {
        context
            .history
            .as_ref()
            .is_some_and(|h| h.recipe_ids.contains(&recipe.id))
    };

    let mut ranked = Vec::with_capacity(candidates.len());
    for recipe in candidates.iter().filter(|r| !already_cooked(r)) {
        ranked.push(Recommendation {
            score: context_score(recipe, context)?,
            factors: context_factors(recipe, context)?,
            recipe: recipe.clone(),
        });
    }

    ranked.sort_by(|a, b| by_score_then_id(a.score, &a.recipe, b.score, &b.recipe));
    ranked.truncate(limit);
    Ok(ranked)
}

fn by_score_then_id(a_score: f64, a: &Recipe, b_score: f64, b: &Recipe) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a.id.cmp(&b.id))
}
