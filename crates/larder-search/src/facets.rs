//! Facet dimensions and bucket post-processing

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::{GROUP_COUNT_FIELD, GROUP_KEY_FIELD};

/// A faceted dimension of the recipe catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetDimension {
    CuisineTypes,
    MealTypes,
    DietaryRestrictions,
    Difficulty,
    Tags,
}

impl FacetDimension {
    pub const ALL: [FacetDimension; 5] = [
        FacetDimension::CuisineTypes,
        FacetDimension::MealTypes,
        FacetDimension::DietaryRestrictions,
        FacetDimension::Difficulty,
        FacetDimension::Tags,
    ];

    /// Name in `SearchFacets`
    pub fn name(&self) -> &'static str {
        match self {
            FacetDimension::CuisineTypes => "cuisine_types",
            FacetDimension::MealTypes => "meal_types",
            FacetDimension::DietaryRestrictions => "dietary_restrictions",
            FacetDimension::Difficulty => "difficulty",
            FacetDimension::Tags => "tags",
        }
    }

    /// Recipe field grouped on
    pub fn field(&self) -> &'static str {
        match self {
            FacetDimension::CuisineTypes => "cuisine",
            FacetDimension::MealTypes => "meal_type",
            FacetDimension::DietaryRestrictions => "dietary_restrictions",
            FacetDimension::Difficulty => "difficulty",
            FacetDimension::Tags => "tags",
        }
    }

    /// Maximum number of buckets returned; `None` is unlimited
    pub fn cap(&self) -> Option<usize> {
        match self {
            FacetDimension::CuisineTypes => Some(20),
            FacetDimension::MealTypes => Some(10),
            FacetDimension::DietaryRestrictions => Some(10),
            FacetDimension::Difficulty => None,
            FacetDimension::Tags => Some(30),
        }
    }

    /// Array-valued fields are unwound before grouping
    pub fn is_array(&self) -> bool {
        matches!(self, FacetDimension::DietaryRestrictions | FacetDimension::Tags)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// One value of a facet and how many matching recipes carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
}

/// Bucket counts for every facet dimension over a filtered set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFacets {
    pub cuisine_types: Vec<FacetBucket>,
    pub meal_types: Vec<FacetBucket>,
    pub dietary_restrictions: Vec<FacetBucket>,
    pub difficulty: Vec<FacetBucket>,
    pub tags: Vec<FacetBucket>,
}

impl SearchFacets {
    pub fn get(&self, dimension: FacetDimension) -> &[FacetBucket] {
        match dimension {
            FacetDimension::CuisineTypes => &self.cuisine_types,
            FacetDimension::MealTypes => &self.meal_types,
            FacetDimension::DietaryRestrictions => &self.dietary_restrictions,
            FacetDimension::Difficulty => &self.difficulty,
            FacetDimension::Tags => &self.tags,
        }
    }

    pub fn set(&mut self, dimension: FacetDimension, buckets: Vec<FacetBucket>) {
        let slot = match dimension {
            FacetDimension::CuisineTypes => &mut self.cuisine_types,
            FacetDimension::MealTypes => &mut self.meal_types,
            FacetDimension::DietaryRestrictions => &mut self.dietary_restrictions,
            FacetDimension::Difficulty => &mut self.difficulty,
            FacetDimension::Tags => &mut self.tags,
        };
        *slot = buckets;
    }

    /// Number of buckets across all dimensions
    pub fn bucket_count(&self) -> usize {
        FacetDimension::ALL.iter().map(|d| self.get(*d).len()).sum()
    }
}

/// Normalize raw `(key, count)` pairs into the buckets of a dimension.
///
/// Null, empty and non-string keys are dropped; the rest are ordered by count
/// descending then value ascending, and cut to the dimension's cap.
pub fn finalize_buckets<I>(dimension: FacetDimension, raw: I) -> Vec<FacetBucket>
where
    I: IntoIterator<Item = (Value, u64)>,
{
    let mut buckets: Vec<FacetBucket> = raw
        .into_iter()
        .filter_map(|(key, count)| match key {
            Value::String(value) if !value.trim().is_empty() => Some(FacetBucket { value, count }),
            _ => None,
        })
        .collect();

    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    if let Some(cap) = dimension.cap() {
        buckets.truncate(cap);
    }
    buckets
}

/// Read `{ _id, count }` group documents as raw bucket pairs
pub fn group_pairs(groups: &[Value]) -> impl Iterator<Item = (Value, u64)> + '_ {
    groups.iter().map(|group| {
        let key = group.get(GROUP_KEY_FIELD).cloned().unwrap_or(Value::Null);
        let count = group.get(GROUP_COUNT_FIELD).and_then(Value::as_u64).unwrap_or(0);
        (key, count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_keys_dropped_and_sorted() {
        let raw = vec![
            (json!("thai"), 2),
            (Value::Null, 9),
            (json!(""), 7),
            (json!(42), 5),
            (json!("italian"), 4),
            (json!("greek"), 2),
        ];

        let buckets = finalize_buckets(FacetDimension::CuisineTypes, raw);
        let values: Vec<&str> = buckets.iter().map(|b| b.value.as_str()).collect();
        assert_eq!(values, vec!["italian", "greek", "thai"]);
    }

    #[test]
    fn test_caps_applied() {
        let raw: Vec<(Value, u64)> = (0..50).map(|i| (json!(format!("tag{:02}", i)), 50 - i)).collect();

        let tags = finalize_buckets(FacetDimension::Tags, raw.clone());
        assert_eq!(tags.len(), 30);
        assert!(tags.windows(2).all(|w| w[0].count >= w[1].count));

        let difficulty = finalize_buckets(FacetDimension::Difficulty, raw);
        assert_eq!(difficulty.len(), 50);
    }

    #[test]
    fn test_group_pairs() {
        let groups = vec![json!({ "_id": "dinner", "count": 3 }), json!({ "_id": null, "count": 1 })];
        let buckets = finalize_buckets(FacetDimension::MealTypes, group_pairs(&groups));
        assert_eq!(buckets, vec![FacetBucket { value: "dinner".into(), count: 3 }]);
    }

    #[test]
    fn test_dimension_lookup() {
        for dimension in FacetDimension::ALL {
            assert_eq!(FacetDimension::from_name(dimension.name()), Some(dimension));
        }
        assert_eq!(FacetDimension::from_name("ratings"), None);
    }
}
