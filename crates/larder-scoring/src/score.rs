//! Similarity and context scores
//!
//! Both scores are sums of independent weighted terms. Each term is capped at
//! its own maximum before summation and the sum is clamped to `[0, 1]`.

use std::collections::HashSet;

use larder_core::{Recipe, Season};

use crate::context::{MatchFactors, RecommendationContext, UserHistory, UserPreferences};
use crate::error::{operations, Result, ScoringError};

pub const SIMILAR_CUISINE_WEIGHT: f64 = 0.30;
pub const SIMILAR_TAGS_WEIGHT: f64 = 0.30;
pub const SIMILAR_DIFFICULTY_WEIGHT: f64 = 0.20;
pub const SIMILAR_TIME_WEIGHT: f64 = 0.20;
/// Score lost per hour of total-time difference
pub const SIMILAR_TIME_DECAY_PER_HOUR: f64 = 0.10;

pub const CONTEXT_CUISINE_WEIGHT: f64 = 0.30;
pub const CONTEXT_DIFFICULTY_WEIGHT: f64 = 0.20;
pub const CONTEXT_TIME_WEIGHT: f64 = 0.20;
pub const CONTEXT_POPULARITY_WEIGHT: f64 = 0.10;
pub const CONTEXT_SEASON_WEIGHT: f64 = 0.20;

/// Highest rating a recipe can carry
pub const MAX_RATING: f64 = 5.0;

/// Symmetric similarity between two recipes, on `[0, 1]`.
pub fn similarity_score(a: &Recipe, b: &Recipe) -> Result<f64> {
    let mut score = 0.0;

    if same_cuisine(a, b) {
        score += SIMILAR_CUISINE_WEIGHT;
    }

    score += SIMILAR_TAGS_WEIGHT * tag_overlap(&a.tags, &b.tags);

    if a.difficulty.is_some() && a.difficulty == b.difficulty {
        score += SIMILAR_DIFFICULTY_WEIGHT;
    }

    score += time_proximity(a.total_time(), b.total_time());

    clamp_unit(operations::SIMILARITY_SCORE, score)
}

/// How well a recipe fits a recommendation context, on `[0, 1]`.
///
/// History does not contribute to the score; it only shows up in
/// `context_factors`.
pub fn context_score(recipe: &Recipe, context: &RecommendationContext) -> Result<f64> {
    let op = operations::CONTEXT_SCORE;
    let mut score = 0.0;

    if let Some(prefs) = &context.preferences {
        if cuisine_preferred(recipe, prefs) {
            score += CONTEXT_CUISINE_WEIGHT;
        }

        if recipe
            .difficulty
            .is_some_and(|d| prefs.difficulty.contains(&d))
        {
            score += CONTEXT_DIFFICULTY_WEIGHT;
        }

        if let Some(fit) = time_fit(recipe.total_time(), prefs.max_time) {
            score += CONTEXT_TIME_WEIGHT * fit;
        }
    }

    score += CONTEXT_POPULARITY_WEIGHT * popularity(op, recipe)?.unwrap_or(0.0);

    if context
        .season
        .is_some_and(|season| recipe.seasons.contains(&season))
    {
        score += CONTEXT_SEASON_WEIGHT;
    }

    clamp_unit(op, score)
}

/// Preference-only factor breakdown (no history or season known).
pub fn match_factors(recipe: &Recipe, preferences: Option<&UserPreferences>) -> Result<MatchFactors> {
    compute_factors(operations::MATCH_FACTORS, recipe, preferences, None, None)
}

/// Factor breakdown for a full recommendation context.
pub fn context_factors(recipe: &Recipe, context: &RecommendationContext) -> Result<MatchFactors> {
    compute_factors(
        operations::CONTEXT_FACTORS,
        recipe,
        context.preferences.as_ref(),
        context.history.as_ref(),
        context.season,
    )
}

fn compute_factors(
    op: &'static str,
    recipe: &Recipe,
    preferences: Option<&UserPreferences>,
    history: Option<&UserHistory>,
    season: Option<Season>,
) -> Result<MatchFactors> {
    let preferences_factor = match preferences {
        Some(prefs) if !prefs.cuisines.is_empty() => indicator(cuisine_preferred(recipe, prefs)),
        _ => MatchFactors::NEUTRAL,
    };

    let history_factor = match (history, recipe.cuisine.as_deref()) {
        (Some(h), Some(cuisine)) if !h.cuisines.is_empty() => {
            indicator(h.cuisines.iter().any(|c| c == cuisine))
        }
        (Some(h), None) if !h.cuisines.is_empty() => 0.0,
        _ => MatchFactors::NEUTRAL,
    };

    let seasonality = match season {
        Some(s) if !recipe.seasons.is_empty() => indicator(recipe.seasons.contains(&s)),
        _ => MatchFactors::NEUTRAL,
    };

    let difficulty = match preferences {
        Some(prefs) if !prefs.difficulty.is_empty() => {
            indicator(recipe.difficulty.is_some_and(|d| prefs.difficulty.contains(&d)))
        }
        _ => MatchFactors::NEUTRAL,
    };

    let timing = match preferences.and_then(|p| p.max_time) {
        Some(max_time) => time_fit(recipe.total_time(), Some(max_time)).unwrap_or(0.0),
        None => MatchFactors::NEUTRAL,
    };

    let factors = MatchFactors {
        preferences: preferences_factor,
        history: history_factor,
        popularity: popularity(op, recipe)?.unwrap_or(0.0),
        seasonality,
        difficulty,
        timing,
    };

    for (name, value) in factors.iter() {
        if !value.is_finite() {
            return Err(ScoringError::failed(op, format!("{} factor is not finite", name)));
        }
    }

    Ok(MatchFactors {
        preferences: factors.preferences.clamp(0.0, 1.0),
        history: factors.history.clamp(0.0, 1.0),
        popularity: factors.popularity.clamp(0.0, 1.0),
        seasonality: factors.seasonality.clamp(0.0, 1.0),
        difficulty: factors.difficulty.clamp(0.0, 1.0),
        timing: factors.timing.clamp(0.0, 1.0),
    })
}

fn indicator(matched: bool) -> f64 {
    if matched {
        1.0
    } else {
        0.0
    }
}

fn same_cuisine(a: &Recipe, b: &Recipe) -> bool {
    match (a.cuisine.as_deref(), b.cuisine.as_deref()) {
        (Some(x), Some(y)) => !x.is_empty() && x == y,
        _ => false,
    }
}

fn cuisine_preferred(recipe: &Recipe, prefs: &UserPreferences) -> bool {
    recipe
        .cuisine
        .as_deref()
        .is_some_and(|c| prefs.cuisines.iter().any(|p| p == c))
}

/// Shared distinct tags divided by the larger distinct tag set
fn tag_overlap(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }

    a.intersection(&b).count() as f64 / larger as f64
}

/// Linear decay with the absolute minute difference; zero beyond 120 minutes.
fn time_proximity(a: u32, b: u32) -> f64 {
    let minutes_apart = a.abs_diff(b) as f64;
    (SIMILAR_TIME_WEIGHT - (minutes_apart / 60.0) * SIMILAR_TIME_DECAY_PER_HOUR).max(0.0)
}

/// `1 - total/max` when the recipe fits the budget, `None` otherwise
fn time_fit(total_time: u32, max_time: Option<u32>) -> Option<f64> {
    match max_time {
        Some(max) if max > 0 && total_time <= max => Some(1.0 - total_time as f64 / max as f64),
        _ => None,
    }
}

/// Normalized average rating, `None` when the recipe has no ratings
fn popularity(op: &'static str, recipe: &Recipe) -> Result<Option<f64>> {
    let Some(ratings) = recipe.ratings else {
        return Ok(None);
    };

    if !ratings.average.is_finite() || ratings.average < 0.0 {
        return Err(ScoringError::failed(
            op,
            format!("invalid rating average {} for recipe {}", ratings.average, recipe.id),
        ));
    }

    Ok(Some((ratings.average / MAX_RATING).min(1.0)))
}

fn clamp_unit(op: &'static str, score: f64) -> Result<f64> {
    if !score.is_finite() {
        return Err(ScoringError::failed(op, "score is not finite"));
    }
    Ok(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::Difficulty;

    const EPS: f64 = 1e-9;

    fn base() -> Recipe {
        Recipe::new("Base")
            .with_cuisine("italian")
            .with_difficulty(Difficulty::Medium)
            .with_times(10, 20)
    }

    #[test]
    fn test_similarity_ninety_minutes_apart() {
        let a = base().with_tags(["pasta"]);
        let b = base().with_times(40, 80).with_tags(["soup"]);

        let score = similarity_score(&a, &b).unwrap();
        assert!((score - 0.55).abs() < EPS, "got {}", score);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = base().with_tags(["pasta", "quick", "vegetarian"]);
        let b = Recipe::new("Other")
            .with_cuisine("italian")
            .with_times(5, 100)
            .with_tags(["quick"]);

        assert_eq!(similarity_score(&a, &b).unwrap(), similarity_score(&b, &a).unwrap());
    }

    #[test]
    fn test_similarity_tag_overlap_uses_larger_set() {
        let a = Recipe::new("A").with_tags(["a", "b"]);
        let b = Recipe::new("B").with_tags(["a", "b", "c", "d"]).with_times(0, 500);

        // 0.30 * 2/4, time term is zero at 500 minutes apart
        let score = similarity_score(&a, &b).unwrap();
        assert!((score - 0.15).abs() < EPS, "got {}", score);
    }

    #[test]
    fn test_similarity_degenerate_recipes() {
        let a = Recipe::new("Empty");
        let b = Recipe::new("Also empty");

        // only the time term contributes: both zero minutes
        let score = similarity_score(&a, &b).unwrap();
        assert!((score - 0.20).abs() < EPS);
    }

    #[test]
    fn test_similarity_identical_recipes_stay_in_range() {
        let a = base().with_tags(["x", "y"]);
        let score = similarity_score(&a, &a.clone()).unwrap();
        assert!((score - 1.0).abs() < EPS);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_empty_cuisines_do_not_match() {
        let a = Recipe::new("A").with_cuisine("");
        let b = Recipe::new("B").with_cuisine("");
        let score = similarity_score(&a, &b).unwrap();
        assert!((score - 0.20).abs() < EPS);
    }

    #[test]
    fn test_context_score_scenario() {
        let recipe = Recipe::new("Risotto").with_cuisine("italian").with_times(5, 15);
        let context = RecommendationContext::default().with_preferences(UserPreferences {
            cuisines: vec!["italian".into()],
            max_time: Some(30),
            ..Default::default()
        });

        let score = context_score(&recipe, &context).unwrap();
        let expected = 0.30 + 0.20 * (1.0 - 20.0 / 30.0);
        assert!((score - expected).abs() < EPS);
        assert!((score - 0.3667).abs() < 1e-4);
    }

    #[test]
    fn test_context_score_over_budget_gets_no_time_credit() {
        let recipe = Recipe::new("Stew").with_times(60, 120);
        let context = RecommendationContext::default().with_preferences(UserPreferences {
            max_time: Some(30),
            ..Default::default()
        });

        assert_eq!(context_score(&recipe, &context).unwrap(), 0.0);
    }

    #[test]
    fn test_context_score_full_match_is_capped() {
        let recipe = base()
            .with_times(0, 0)
            .with_rating(9.0, 10)
            .with_seasons(vec![Season::Winter]);
        let context = RecommendationContext::default()
            .with_preferences(UserPreferences {
                cuisines: vec!["italian".into()],
                difficulty: vec![Difficulty::Medium],
                max_time: Some(30),
            })
            .with_season(Season::Winter);

        let score = context_score(&recipe, &context).unwrap();
        assert!((score - 1.0).abs() < EPS);
    }

    #[test]
    fn test_invalid_rating_names_operation() {
        let recipe = Recipe::new("Broken").with_rating(f64::NAN, 1);

        let err = context_score(&recipe, &RecommendationContext::default()).unwrap_err();
        assert_eq!(err.operation(), operations::CONTEXT_SCORE);

        let err = context_factors(&recipe, &RecommendationContext::default()).unwrap_err();
        assert_eq!(err.operation(), operations::CONTEXT_FACTORS);
        assert!(err.to_string().contains("context factors"));
    }

    #[test]
    fn test_factors_default_to_neutral() {
        let recipe = base().with_seasons(vec![Season::Summer]);
        let factors = context_factors(&recipe, &RecommendationContext::default()).unwrap();

        assert_eq!(factors.history, 0.5);
        assert_eq!(factors.seasonality, 0.5);
        assert_eq!(factors.difficulty, 0.5);
        assert_eq!(factors.preferences, 0.5);
        assert_eq!(factors.timing, 0.5);
        assert_eq!(factors.popularity, 0.0);
    }

    #[test]
    fn test_factors_penalize_explicit_mismatch_only() {
        let recipe = base()
            .with_seasons(vec![Season::Summer])
            .with_rating(4.0, 3);
        let context = RecommendationContext::default()
            .with_preferences(UserPreferences {
                cuisines: vec!["thai".into()],
                difficulty: vec![Difficulty::Medium],
                max_time: Some(60),
            })
            .with_history(UserHistory {
                cuisines: vec!["italian".into()],
                recipe_ids: Vec::new(),
            })
            .with_season(Season::Winter);

        let factors = context_factors(&recipe, &context).unwrap();
        assert_eq!(factors.preferences, 0.0);
        assert_eq!(factors.history, 1.0);
        assert_eq!(factors.seasonality, 0.0);
        assert_eq!(factors.difficulty, 1.0);
        assert!((factors.timing - 0.5).abs() < EPS);
        assert!((factors.popularity - 0.8).abs() < EPS);
    }

    #[test]
    fn test_match_factors_ignore_history_and_season() {
        let recipe = base().with_seasons(vec![Season::Spring]);
        let prefs = UserPreferences {
            cuisines: vec!["italian".into()],
            ..Default::default()
        };

        let factors = match_factors(&recipe, Some(&prefs)).unwrap();
        assert_eq!(factors.preferences, 1.0);
        assert_eq!(factors.history, 0.5);
        assert_eq!(factors.seasonality, 0.5);
    }

    #[test]
    fn test_all_factors_within_unit_range() {
        let recipes = [
            Recipe::new("a"),
            base().with_rating(5.0, 1),
            base().with_times(500, 500).with_rating(0.0, 0),
        ];
        let context = RecommendationContext::default().with_preferences(UserPreferences {
            max_time: Some(0),
            ..Default::default()
        });

        for recipe in &recipes {
            let factors = context_factors(recipe, &context).unwrap();
            for (_, value) in factors.iter() {
                assert!((0.0..=1.0).contains(&value));
            }
            let score = context_score(recipe, &context).unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    mod props {
        use super::*;
        use larder_core::Difficulty;
        use proptest::prelude::*;

        const CUISINES: &[&str] = &["italian", "mexican", "indian", "thai", ""];
        const TAGS: &[&str] = &["spicy", "quick", "vegetarian", "soup", "baked", "grilled"];
        const DIFFICULTIES: &[Difficulty] = &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
        const SEASONS: &[Season] = &[Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

        fn arb_recipe() -> impl Strategy<Value = Recipe> {
            (
                prop::option::of(prop::sample::select(CUISINES)),
                prop::option::of(prop::sample::select(DIFFICULTIES)),
                0u32..400,
                0u32..400,
                prop::sample::subsequence(TAGS, 0..=TAGS.len()),
                // averages above the maximum still normalize into range
                prop::option::of((0.0f64..10.0, 0u32..10_000)),
                prop::sample::subsequence(SEASONS, 0..=SEASONS.len()),
            )
                .prop_map(|(cuisine, difficulty, prep, cook, tags, rating, seasons)| {
                    let mut recipe = Recipe::new("Generated").with_times(prep, cook).with_tags(tags);
                    if let Some(cuisine) = cuisine {
                        recipe = recipe.with_cuisine(cuisine);
                    }
                    if let Some(difficulty) = difficulty {
                        recipe = recipe.with_difficulty(difficulty);
                    }
                    if let Some((average, count)) = rating {
                        recipe = recipe.with_rating(average, count);
                    }
                    recipe.with_seasons(seasons)
                })
        }

        fn arb_context() -> impl Strategy<Value = RecommendationContext> {
            (
                prop::option::of((
                    prop::sample::subsequence(CUISINES, 0..=3),
                    prop::sample::subsequence(DIFFICULTIES, 0..=DIFFICULTIES.len()),
                    prop::option::of(0u32..900),
                )),
                prop::option::of(prop::sample::subsequence(CUISINES, 0..=3)),
                prop::option::of(prop::sample::select(SEASONS)),
            )
                .prop_map(|(preferences, history, season)| RecommendationContext {
                    preferences: preferences.map(|(cuisines, difficulty, max_time)| UserPreferences {
                        cuisines: cuisines.into_iter().map(str::to_string).collect(),
                        difficulty,
                        max_time,
                    }),
                    history: history.map(|cuisines| UserHistory {
                        cuisines: cuisines.into_iter().map(str::to_string).collect(),
                        recipe_ids: Vec::new(),
                    }),
                    season,
                })
        }

        proptest! {
            #[test]
            fn prop_similarity_in_unit_range(a in arb_recipe(), b in arb_recipe()) {
                let score = similarity_score(&a, &b).unwrap();
                prop_assert!((0.0..=1.0).contains(&score), "similarity {} out of range", score);
            }

            #[test]
            fn prop_similarity_is_symmetric(a in arb_recipe(), b in arb_recipe()) {
                prop_assert_eq!(similarity_score(&a, &b).unwrap(), similarity_score(&b, &a).unwrap());
            }

            #[test]
            fn prop_recipe_is_at_least_as_similar_to_itself(a in arb_recipe(), b in arb_recipe()) {
                let own = similarity_score(&a, &a).unwrap();
                let other = similarity_score(&a, &b).unwrap();
                prop_assert!(own + EPS >= other, "self {} below other {}", own, other);
            }

            #[test]
            fn prop_context_score_in_unit_range(recipe in arb_recipe(), context in arb_context()) {
                let score = context_score(&recipe, &context).unwrap();
                prop_assert!((0.0..=1.0).contains(&score), "context score {} out of range", score);
            }

            #[test]
            fn prop_factors_in_unit_range(recipe in arb_recipe(), context in arb_context()) {
                let factors = context_factors(&recipe, &context).unwrap();
                for (name, value) in factors.iter() {
                    prop_assert!((0.0..=1.0).contains(&value), "{} factor {} out of range", name, value);
                }

                let factors = match_factors(&recipe, context.preferences.as_ref()).unwrap();
                prop_assert_eq!(factors.history, MatchFactors::NEUTRAL);
                prop_assert_eq!(factors.seasonality, MatchFactors::NEUTRAL);
            }
        }
    }
}
