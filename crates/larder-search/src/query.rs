//! Search query types and validation

use larder_core::{Difficulty, RecipeId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::highlight::Highlights;

/// Longest free-text query accepted, in characters
pub const MAX_TEXT_LEN: usize = 256;

/// Search query
///
/// Immutable input to the engine. Call `validate` before compiling it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query; blank text counts as absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Filters to apply
    #[serde(default)]
    pub filters: SearchFilters,

    /// Explicit ordering (relevance when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOption>,

    /// 1-based page number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Results per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an untyped query (e.g. translated HTTP parameters).
    ///
    /// Type mismatches such as a negative page or a non-string text are
    /// reported as validation errors.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SearchError::validation(format!("malformed query: {}", e)))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortOption {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Trimmed text, `None` when absent or blank
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Requested page, defaulting to the first
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Requested limit, or `default` when unspecified
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default)
    }

    /// Check the query before any backend work.
    pub fn validate(&self, max_page_size: u32) -> Result<()> {
        if let Some(text) = &self.text {
            if text.chars().count() > MAX_TEXT_LEN {
                return Err(SearchError::validation(format!(
                    "text must be at most {} characters",
                    MAX_TEXT_LEN
                )));
            }
        }

        if self.page == Some(0) {
            return Err(SearchError::validation("page must be a positive integer"));
        }

        match self.limit {
            Some(0) => return Err(SearchError::validation("limit must be a positive integer")),
            Some(limit) if limit > max_page_size => {
                return Err(SearchError::validation(format!(
                    "limit must not exceed {}",
                    max_page_size
                )))
            }
            _ => {}
        }

        if let Some(sort) = &self.sort {
            if sort.field.trim().is_empty() {
                return Err(SearchError::validation("sort field must not be empty"));
            }
        }

        self.filters.validate()
    }
}

/// Search filters
///
/// Empty lists impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Meal types to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,

    /// Cuisines to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cuisine: Vec<String>,

    /// Difficulty levels to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub difficulty: Vec<String>,

    /// Ingredients that must all be present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,

    /// Bounds on total (prep + cook) time in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeRange>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.category.is_empty()
            && self.cuisine.is_empty()
            && self.difficulty.is_empty()
            && self.ingredients.is_empty()
            && self.time.is_none()
    }

    pub fn with_category(mut self, values: &[&str]) -> Self {
        self.category = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_cuisine(mut self, values: &[&str]) -> Self {
        self.cuisine = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_difficulty(mut self, values: &[&str]) -> Self {
        self.difficulty = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_ingredients(mut self, values: &[&str]) -> Self {
        self.ingredients = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_time(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.time = Some(TimeRange { min, max });
        self
    }

    /// Canonical difficulty names, in the order given
    pub fn difficulties(&self) -> Result<Vec<Difficulty>> {
        self.difficulty
            .iter()
            .map(|d| {
                d.parse::<Difficulty>()
                    .map_err(|_| SearchError::validation(format!("unknown difficulty '{}'", d)))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for (name, values) in [
            ("category", &self.category),
            ("cuisine", &self.cuisine),
            ("difficulty", &self.difficulty),
            ("ingredients", &self.ingredients),
        ] {
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(SearchError::validation(format!("{} filter contains an empty value", name)));
            }
        }

        self.difficulties()?;

        if let Some(TimeRange {
            min: Some(min),
            max: Some(max),
        }) = self.time
        {
            if min > max {
                return Err(SearchError::validation(format!(
                    "time.min ({}) must not exceed time.max ({})",
                    min, max
                )));
            }
        }

        Ok(())
    }
}

/// Total-time bounds in minutes; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

/// Explicit result ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    /// Document field path, or `score`/`relevance`/`total_time`
    pub field: String,

    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: RecipeId,

    pub title: String,

    pub description: String,

    /// Relevance score; only present for text queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Matched fields; only present for text queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Highlights>,
}

/// A page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,

    /// Total number of matches across all pages
    pub total: u64,

    /// The page returned (1-based)
    pub page: u32,

    pub total_pages: u64,
}

impl SearchResults {
    pub fn empty(page: u32) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
        }
    }
}

/// `ceil(total / limit)`; zero when there are no matches
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_min_greater_than_max_rejected() {
        let query = SearchQuery::new().with_filters(SearchFilters::default().with_time(Some(60), Some(30)));
        let err = query.validate(100).unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    #[test]
    fn test_open_ended_time_is_valid() {
        let query = SearchQuery::new().with_filters(SearchFilters::default().with_time(Some(60), None));
        assert!(query.validate(100).is_ok());
    }

    #[test]
    fn test_page_and_limit_bounds() {
        assert!(SearchQuery::new().with_page(0).validate(100).is_err());
        assert!(SearchQuery::new().with_limit(0).validate(100).is_err());
        assert!(SearchQuery::new().with_limit(101).validate(100).is_err());
        assert!(SearchQuery::new().with_page(3).with_limit(100).validate(100).is_ok());
    }

    #[test]
    fn test_unknown_difficulty_rejected() {
        let query = SearchQuery::new().with_filters(SearchFilters::default().with_difficulty(&["expert"]));
        assert!(query.validate(100).is_err());
    }

    #[test]
    fn test_blank_text_is_absent() {
        let query = SearchQuery::new().with_text("   ");
        assert_eq!(query.text(), None);
        assert_eq!(SearchQuery::new().with_text(" soup ").text(), Some("soup"));
    }

    #[test]
    fn test_overlong_text_rejected() {
        let query = SearchQuery::new().with_text("a".repeat(MAX_TEXT_LEN + 1));
        assert!(query.validate(100).is_err());
    }

    #[test]
    fn test_from_value_maps_type_errors_to_validation() {
        let negative = SearchQuery::from_value(json!({ "page": -1 }));
        assert!(matches!(negative, Err(SearchError::Validation(_))));

        let fractional = SearchQuery::from_value(json!({ "limit": 2.5 }));
        assert!(matches!(fractional, Err(SearchError::Validation(_))));

        let non_string = SearchQuery::from_value(json!({ "text": 42 }));
        assert!(matches!(non_string, Err(SearchError::Validation(_))));

        let ok = SearchQuery::from_value(json!({
            "text": "soup",
            "filters": { "cuisine": ["thai"], "time": { "max": 30 } },
            "sort": { "field": "title", "direction": "asc" },
            "page": 2
        }))
        .unwrap();
        assert_eq!(ok.filters.cuisine, vec!["thai"]);
        assert_eq!(ok.sort.unwrap().direction, SortDirection::Asc);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(15, 10), 2);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(21, 10), 3);
        assert_eq!(total_pages(1, 100), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_total_pages_is_ceiling(total in 0u64..1_000_000, limit in 1u32..=100) {
                let pages = total_pages(total, limit);
                let limit = limit as u64;

                prop_assert_eq!(pages, (total + limit - 1) / limit);
                // every match fits in the pages, and no page is empty
                prop_assert!(pages * limit >= total);
                if pages > 0 {
                    prop_assert!((pages - 1) * limit < total);
                }
            }
        }
    }
}
