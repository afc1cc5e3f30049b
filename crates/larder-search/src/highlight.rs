//! Match highlighting
//!
//! Highlights are whole field values, not fragments: a matching title or
//! description is returned as-is, and list fields return each matching item.

use larder_core::Recipe;
use serde::{Deserialize, Serialize};

/// Fields of a recipe that matched the search text.
///
/// A field with no match is absent, never an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
}

impl Highlights {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
    }
}

/// Compute highlights for `recipe` against free text.
pub fn highlight(recipe: &Recipe, text: &str) -> Highlights {
    let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Highlights::default();
    }

    let matches = |value: &str| {
        let value = value.to_lowercase();
        terms.iter().any(|term| value.contains(term.as_str()))
    };
    let whole = |value: &str| matches(value).then(|| vec![value.to_string()]);
    let items = |values: Vec<&str>| {
        let hits: Vec<String> = values
            .into_iter()
            .filter(|v| matches(v))
            .map(str::to_string)
            .collect();
        (!hits.is_empty()).then_some(hits)
    };

    Highlights {
        title: whole(&recipe.title),
        description: whole(&recipe.description),
        ingredients: items(recipe.ingredient_names().collect()),
        instructions: items(recipe.instructions.iter().map(String::as_str).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tacos() -> Recipe {
        Recipe::new("Spicy Chicken Tacos")
            .with_description("Weeknight tacos with a kick")
            .with_ingredients(["chicken thigh", "tortilla", "chipotle"])
            .with_instructions(["Marinate the chicken", "Warm tortillas", "Assemble"])
    }

    #[test]
    fn test_highlight_whole_values_and_matching_items() {
        let highlights = highlight(&tacos(), "CHICKEN");

        assert_eq!(highlights.title, Some(vec!["Spicy Chicken Tacos".to_string()]));
        assert_eq!(highlights.description, None);
        assert_eq!(highlights.ingredients, Some(vec!["chicken thigh".to_string()]));
        assert_eq!(highlights.instructions, Some(vec!["Marinate the chicken".to_string()]));
    }

    #[test]
    fn test_substring_containment() {
        // "tortilla" is contained in "Warm tortillas"
        let highlights = highlight(&tacos(), "tortilla");
        assert_eq!(highlights.instructions, Some(vec!["Warm tortillas".to_string()]));
        assert_eq!(highlights.ingredients, Some(vec!["tortilla".to_string()]));
    }

    #[test]
    fn test_non_matching_document_has_no_keys() {
        let highlights = highlight(&tacos(), "lasagna");
        assert!(highlights.is_empty());

        let json = serde_json::to_value(&highlights).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_blank_text_highlights_nothing() {
        assert!(highlight(&tacos(), "   ").is_empty());
    }
}
