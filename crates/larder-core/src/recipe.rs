//! Recipe types - the documents every search backend indexes

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Unique identifier for a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub Uuid);

impl RecipeId {
    /// Create a new random RecipeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RecipeId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a RecipeId from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecipeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How demanding a recipe is to cook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(CoreError::InvalidDifficulty(s.to_string())),
        }
    }
}

/// Season a recipe is declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            _ => Err(CoreError::InvalidSeason(s.to_string())),
        }
    }
}

/// A single ingredient line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name, used for all-of filtering and highlighting
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Ingredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            unit: None,
        }
    }
}

/// Aggregate user rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    /// Mean rating on a 0-5 scale
    pub average: f64,

    /// Number of ratings the average is based on
    pub count: u32,
}

/// A recipe document
///
/// This is the shape both search backends index and the shape the scoring
/// module reads. Times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Unique identifier for this recipe
    pub id: RecipeId,

    /// Display title
    pub title: String,

    /// Free-text summary
    #[serde(default)]
    pub description: String,

    /// Cuisine (e.g., "italian", "mexican")
    #[serde(default)]
    pub cuisine: Option<String>,

    /// Meal type (e.g., "dinner", "dessert"); the `category` search filter applies here
    #[serde(default)]
    pub meal_type: Option<String>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,

    /// Preparation time in minutes
    #[serde(default)]
    pub prep_time: u32,

    /// Cooking time in minutes
    #[serde(default)]
    pub cook_time: u32,

    #[serde(default)]
    pub servings: Option<u32>,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    /// Ordered instruction steps
    #[serde(default)]
    pub instructions: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub dietary_restrictions: Vec<String>,

    /// Seasons the recipe is declared for (empty = year-round)
    #[serde(default)]
    pub seasons: Vec<Season>,

    #[serde(default)]
    pub ratings: Option<Ratings>,

    /// When the recipe was created
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Create a new recipe with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: RecipeId::new(),
            title: title.into(),
            description: String::new(),
            cuisine: None,
            meal_type: None,
            difficulty: None,
            prep_time: 0,
            cook_time: 0,
            servings: None,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            tags: Vec::new(),
            dietary_restrictions: Vec::new(),
            seasons: Vec::new(),
            ratings: None,
            created_at: Utc::now(),
        }
    }

    /// Total time in minutes (prep + cook)
    pub fn total_time(&self) -> u32 {
        self.prep_time.saturating_add(self.cook_time)
    }

    /// Ingredient names in declaration order
    pub fn ingredient_names(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(|i| i.name.as_str())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }

    pub fn with_meal_type(mut self, meal_type: impl Into<String>) -> Self {
        self.meal_type = Some(meal_type.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_times(mut self, prep_time: u32, cook_time: u32) -> Self {
        self.prep_time = prep_time;
        self.cook_time = cook_time;
        self
    }

    pub fn with_ingredients<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = names.into_iter().map(Ingredient::named).collect();
        self
    }

    pub fn with_instructions<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dietary_restrictions<I, S>(mut self, restrictions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dietary_restrictions = restrictions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_seasons(mut self, seasons: Vec<Season>) -> Self {
        self.seasons = seasons;
        self
    }

    pub fn with_rating(mut self, average: f64, count: u32) -> Self {
        self.ratings = Some(Ratings { average, count });
        self
    }
}

/// Well-known meal types
pub mod meal_types {
    pub const BREAKFAST: &str = "breakfast";
    pub const LUNCH: &str = "lunch";
    pub const DINNER: &str = "dinner";
    pub const DESSERT: &str = "dessert";
    pub const SNACK: &str = "snack";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_time() {
        let recipe = Recipe::new("Soup").with_times(15, 45);
        assert_eq!(recipe.total_time(), 60);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("Easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!(" hard ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_season_parse_accepts_fall() {
        assert_eq!("fall".parse::<Season>().unwrap(), Season::Autumn);
    }

    #[test]
    fn test_recipe_json_shape() {
        let recipe = Recipe::new("Tacos")
            .with_cuisine("mexican")
            .with_difficulty(Difficulty::Easy)
            .with_ingredients(["tortilla", "beef"]);

        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["id"], serde_json::json!(recipe.id.to_string()));
        assert_eq!(value["difficulty"], "easy");
        assert_eq!(value["ingredients"][1]["name"], "beef");
        assert!(value["ratings"].is_null());
    }

    #[test]
    fn test_recipe_deserialize_minimal() {
        let id = RecipeId::new();
        let json = format!(
            r#"{{"id":"{}","title":"Toast","created_at":"2024-01-01T00:00:00Z"}}"#,
            id
        );
        let recipe: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(recipe.id, id);
        assert!(recipe.tags.is_empty());
        assert_eq!(recipe.total_time(), 0);
    }
}
