//! Recommendation context and explainability types

use larder_core::{Difficulty, RecipeId, Season};
use serde::{Deserialize, Serialize};

/// What a user has said they like
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub cuisines: Vec<String>,

    #[serde(default)]
    pub difficulty: Vec<Difficulty>,

    /// Upper bound on total time in minutes
    #[serde(default)]
    pub max_time: Option<u32>,
}

/// What a user has cooked before
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    /// Cuisines of recently cooked recipes
    #[serde(default)]
    pub cuisines: Vec<String>,

    /// Recipes already cooked; excluded from recommendations
    #[serde(default)]
    pub recipe_ids: Vec<RecipeId>,
}

impl UserHistory {
    pub fn is_empty(&self) -> bool {
        self.cuisines.is_empty() && self.recipe_ids.is_empty()
    }
}

/// Everything a context-aware recommendation may take into account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationContext {
    #[serde(default)]
    pub preferences: Option<UserPreferences>,

    #[serde(default)]
    pub history: Option<UserHistory>,

    #[serde(default)]
    pub season: Option<Season>,
}

impl RecommendationContext {
    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_history(mut self, history: UserHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }
}

/// Per-signal breakdown accompanying a recommendation score.
///
/// Each factor is on `[0, 1]`: 1 is a full match, 0.5 neutral or unknown,
/// 0 an explicit mismatch. This explains a score; it is not the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchFactors {
    pub preferences: f64,
    pub history: f64,
    pub popularity: f64,
    pub seasonality: f64,
    pub difficulty: f64,
    pub timing: f64,
}

impl MatchFactors {
    pub const NEUTRAL: f64 = 0.5;

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("preferences", self.preferences),
            ("history", self.history),
            ("popularity", self.popularity),
            ("seasonality", self.seasonality),
            ("difficulty", self.difficulty),
            ("timing", self.timing),
        ]
        .into_iter()
    }
}
