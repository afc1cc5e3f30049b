//! Backend-neutral query representation
//!
//! The compiler emits `Predicate`s and `PipelineStage`s; each backend adapter
//! interprets them in its own way. Documents flowing through the aggregation
//! path are JSON objects shaped like a serialized `Recipe`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::SortDirection;

/// Field holding a document's text score on the aggregation path
pub const SCORE_FIELD: &str = "_score";

/// Field used to break sort ties
pub const ID_FIELD: &str = "id";

/// Grouping output fields
pub const GROUP_KEY_FIELD: &str = "_id";
pub const GROUP_COUNT_FIELD: &str = "count";

/// Fields searched by free text, with their relevance weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    Description,
    IngredientNames,
    Tags,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Title,
        TextField::Description,
        TextField::IngredientNames,
        TextField::Tags,
    ];

    /// Document path of the field
    pub fn path(&self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Description => "description",
            TextField::IngredientNames => "ingredients.name",
            TextField::Tags => "tags",
        }
    }

    pub fn weight(&self) -> f32 {
        match self {
            TextField::Title => 3.0,
            TextField::Description => 2.0,
            TextField::IngredientNames | TextField::Tags => 1.0,
        }
    }
}

/// A filter or match condition on a single document
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field value is one of `values`
    In { field: String, values: Vec<String> },

    /// Every one of `values` appears among the field's values
    All { field: String, values: Vec<String> },

    /// `prep_time + cook_time` lies within the bounds (inclusive)
    TotalTime { min: Option<u32>, max: Option<u32> },

    /// Any token appears in a weighted text field
    Text { tokens: Vec<String> },

    /// The field contains `tokens` as a phrase whose last token is a prefix
    PhrasePrefix { field: String, tokens: Vec<String> },
}

/// What a sort orders by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Relevance score
    Score,
    /// `prep_time + cook_time`
    TotalTime,
    /// A document field path
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn field(path: impl Into<String>, direction: SortDirection) -> Self {
        Self::new(SortKey::Field(path.into()), direction)
    }
}

/// One stage of an aggregation pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    /// Keep documents satisfying every predicate
    Match(Vec<Predicate>),
    Sort(Vec<SortSpec>),
    Skip(u64),
    Limit(u64),
    /// Run named sub-pipelines over the same input, yielding one document
    Facet(Vec<(String, Vec<PipelineStage>)>),
    /// Count documents per distinct value of `key` (one group when `None`)
    Group { key: Option<String> },
    /// Emit one document per element of an array field
    Unwind(String),
}

/// Split text the way the full-text index does: lower-cased alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// All values at a dotted path, flattening arrays along the way
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            let child = match value {
                Value::Object(map) => map.get(segment),
                _ => None,
            };
            match child {
                Some(Value::Array(items)) => next.extend(items.iter()),
                Some(v) => next.push(v),
                None => {}
            }
        }
        current = next;
    }
    current
}

/// String values at a path
pub fn resolve_strings<'a>(doc: &'a Value, path: &str) -> Vec<&'a str> {
    resolve(doc, path).into_iter().filter_map(Value::as_str).collect()
}

/// Total time of a serialized recipe
pub fn total_time_of(doc: &Value) -> u64 {
    let minutes = |field: &str| doc.get(field).and_then(Value::as_u64).unwrap_or(0);
    minutes("prep_time") + minutes("cook_time")
}

/// The value a document sorts by for `key`
pub fn sort_value(doc: &Value, key: &SortKey) -> Option<Value> {
    match key {
        SortKey::Score => doc.get(SCORE_FIELD).cloned(),
        SortKey::TotalTime => Some(Value::from(total_time_of(doc))),
        SortKey::Field(path) => resolve(doc, path).into_iter().next().cloned(),
    }
}

/// Order two documents by a list of sort specs
pub fn compare_documents(a: &Value, b: &Value, specs: &[SortSpec]) -> Ordering {
    for spec in specs {
        let ordering = compare_values(
            sort_value(a, &spec.key).as_ref(),
            sort_value(b, &spec.key).as_ref(),
        );
        let ordering = match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Cross-type ordering: missing/null < numbers < strings < booleans < everything else
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Bool(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Spicy, Chicken-Wings!"), vec!["spicy", "chicken", "wings"]);
        assert!(tokenize("  --  ").is_empty());
    }

    #[test]
    fn test_resolve_flattens_arrays() {
        let doc = json!({
            "ingredients": [{ "name": "rice" }, { "name": "beans" }, { "quantity": 1 }],
            "tags": ["quick", "vegan"]
        });

        assert_eq!(resolve_strings(&doc, "ingredients.name"), vec!["rice", "beans"]);
        assert_eq!(resolve_strings(&doc, "tags"), vec!["quick", "vegan"]);
        assert!(resolve(&doc, "missing.path").is_empty());
    }

    #[test]
    fn test_compare_documents_with_tie_break() {
        let a = json!({ "id": "a", "prep_time": 10, "cook_time": 5 });
        let b = json!({ "id": "b", "prep_time": 5, "cook_time": 10 });
        let specs = vec![
            SortSpec::new(SortKey::TotalTime, SortDirection::Desc),
            SortSpec::field(ID_FIELD, SortDirection::Asc),
        ];

        assert_eq!(compare_documents(&a, &b, &specs), Ordering::Less);
        assert_eq!(compare_documents(&b, &a, &specs), Ordering::Greater);
    }

    #[test]
    fn test_missing_values_sort_first_ascending() {
        let with = json!({ "ratings": { "average": 4.5 } });
        let without = json!({ "ratings": null });
        let specs = vec![SortSpec::field("ratings.average", SortDirection::Asc)];

        assert_eq!(compare_documents(&without, &with, &specs), Ordering::Less);
    }
}
