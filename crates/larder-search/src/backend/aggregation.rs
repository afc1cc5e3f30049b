//! Aggregation backend
//!
//! Runs compiled pipelines against a `DocumentCollection`. `MemoryCollection`
//! is the bundled collection: it holds serialized recipes and interprets the
//! pipeline stages itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use larder_core::{Recipe, RecipeId};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::{RawHit, RawPage, SearchBackend};
use crate::compiler::{BackendQuery, QueryCompiler, QueryPlan, RESULTS_FACET, TOTAL_FACET};
use crate::config::{BackendKind, EngineConfig};
use crate::error::{Result, SearchError};
use crate::facets::{finalize_buckets, group_pairs, FacetDimension, SearchFacets};
use crate::pipeline::{
    compare_documents, resolve, resolve_strings, tokenize, total_time_of, PipelineStage, Predicate, TextField,
    GROUP_COUNT_FIELD, GROUP_KEY_FIELD, ID_FIELD, SCORE_FIELD,
};
use crate::query::SearchQuery;

/// A document store that can run aggregation pipelines
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    async fn aggregate(&self, pipeline: &[PipelineStage]) -> Result<Vec<Value>>;
}

/// In-memory collection of recipe documents
pub struct MemoryCollection {
    documents: RwLock<Vec<Value>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    pub fn from_recipes(recipes: &[Recipe]) -> Result<Self> {
        let documents = recipes
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            documents: RwLock::new(documents),
        })
    }

    /// Insert or replace a recipe
    pub async fn upsert(&self, recipe: &Recipe) -> Result<()> {
        let doc = serde_json::to_value(recipe)?;
        let id = recipe.id.to_string();
        let mut documents = self.documents.write().await;
        match documents
            .iter_mut()
            .find(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
        {
            Some(existing) => *existing = doc,
            None => documents.push(doc),
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn aggregate(&self, pipeline: &[PipelineStage]) -> Result<Vec<Value>> {
        let documents = self.documents.read().await.clone();
        run_pipeline(documents, pipeline, false)
    }
}

fn run_pipeline(mut docs: Vec<Value>, stages: &[PipelineStage], nested: bool) -> Result<Vec<Value>> {
    for stage in stages {
        docs = match stage {
            PipelineStage::Match(predicates) => apply_match(docs, predicates),
            PipelineStage::Sort(specs) => {
                docs.sort_by(|a, b| compare_documents(a, b, specs));
                docs
            }
            PipelineStage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
            PipelineStage::Limit(n) => docs.into_iter().take(*n as usize).collect(),
            PipelineStage::Facet(facets) => {
                if nested {
                    return Err(SearchError::database("facet stages cannot be nested"));
                }
                let mut out = serde_json::Map::new();
                for (name, sub) in facets {
                    let results = run_pipeline(docs.clone(), sub, true)?;
                    out.insert(name.clone(), Value::Array(results));
                }
                vec![Value::Object(out)]
            }
            PipelineStage::Group { key } => group(&docs, key.as_deref()),
            PipelineStage::Unwind(path) => unwind(docs, path),
        };
    }
    Ok(docs)
}

fn apply_match(docs: Vec<Value>, predicates: &[Predicate]) -> Vec<Value> {
    docs.into_iter()
        .filter_map(|mut doc| {
            let mut score = None;
            for predicate in predicates {
                match predicate {
                    Predicate::Text { tokens } => {
                        let s = text_score(&doc, tokens);
                        if s <= 0.0 {
                            return None;
                        }
                        score = Some(s);
                    }
                    other if !satisfies(&doc, other) => return None,
                    _ => {}
                }
            }
            if let (Some(score), Value::Object(map)) = (score, &mut doc) {
                map.insert(SCORE_FIELD.to_string(), json!(score));
            }
            Some(doc)
        })
        .collect()
}

fn satisfies(doc: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::In { field, values } => resolve_strings(doc, field)
            .iter()
            .any(|v| values.iter().any(|want| want == v)),
        Predicate::All { field, values } => {
            let present = resolve_strings(doc, field);
            values.iter().all(|want| present.contains(&want.as_str()))
        }
        Predicate::TotalTime { min, max } => {
            let total = total_time_of(doc);
            min.is_none_or(|min| total >= min as u64) && max.is_none_or(|max| total <= max as u64)
        }
        Predicate::Text { tokens } => text_score(doc, tokens) > 0.0,
        Predicate::PhrasePrefix { field, tokens } => resolve_strings(doc, field)
            .iter()
            .any(|value| phrase_prefix_matches(&tokenize(value), tokens)),
    }
}

/// Sum of field weight times distinct query tokens found in that field
fn text_score(doc: &Value, tokens: &[String]) -> f32 {
    TextField::ALL
        .iter()
        .map(|field| {
            let words: Vec<String> = resolve_strings(doc, field.path())
                .into_iter()
                .flat_map(tokenize)
                .collect();
            let hits = tokens
                .iter()
                .enumerate()
                .filter(|(i, t)| words.contains(*t) && !tokens[..*i].contains(*t))
                .count();
            field.weight() * hits as f32
        })
        .sum()
}

fn phrase_prefix_matches(words: &[String], tokens: &[String]) -> bool {
    let Some((last, head)) = tokens.split_last() else {
        return false;
    };
    if words.len() < tokens.len() {
        return false;
    }
    words.windows(tokens.len()).any(|window| {
        window[..head.len()] == *head && window[head.len()].starts_with(last.as_str())
    })
}

fn group(docs: &[Value], key: Option<&str>) -> Vec<Value> {
    let Some(path) = key else {
        if docs.is_empty() {
            return Vec::new();
        }
        return vec![json!({ GROUP_KEY_FIELD: Value::Null, GROUP_COUNT_FIELD: docs.len() })];
    };

    let mut order: Vec<(Value, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let key = resolve(doc, path)
            .into_iter()
            .next()
            .cloned()
            .unwrap_or(Value::Null);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            order.push((key.clone(), 0));
            order.len() - 1
        });
        order[slot].1 += 1;
    }

    order
        .into_iter()
        .map(|(key, count)| json!({ GROUP_KEY_FIELD: key, GROUP_COUNT_FIELD: count }))
        .collect()
}

fn unwind(docs: Vec<Value>, path: &str) -> Vec<Value> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.get(path) {
            Some(Value::Array(items)) => {
                for item in items {
                    let mut copy = doc.clone();
                    if let Value::Object(map) = &mut copy {
                        map.insert(path.to_string(), item.clone());
                    }
                    out.push(copy);
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => out.push(doc),
        }
    }
    out
}

/// Backend answering queries with aggregation pipelines
pub struct AggregationBackend {
    collection: Arc<dyn DocumentCollection>,
    compiler: QueryCompiler,
}

impl AggregationBackend {
    pub fn new(collection: Arc<dyn DocumentCollection>, config: &EngineConfig) -> Self {
        Self {
            collection,
            compiler: QueryCompiler::new(config),
        }
    }

    fn to_hit(doc: Value, scored: bool) -> Result<RawHit> {
        let score = if scored {
            doc.get(SCORE_FIELD).and_then(Value::as_f64).map(|s| s as f32)
        } else {
            None
        };
        let recipe: Recipe =
            serde_json::from_value(doc).map_err(|e| SearchError::database(format!("malformed recipe document: {}", e)))?;
        Ok(RawHit { recipe, score })
    }
}

#[async_trait]
impl SearchBackend for AggregationBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Aggregation
    }

    fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    async fn execute(&self, query: &BackendQuery) -> Result<RawPage> {
        let QueryPlan::Pipeline(stages) = &query.plan else {
            return Err(SearchError::database("aggregation backend received a full-text query"));
        };

        let mut docs = self.collection.aggregate(stages).await?;
        let scored = query.text.is_some();

        let (results, total) = if matches!(stages.last(), Some(PipelineStage::Facet(_))) {
            let mut facet = docs.pop().unwrap_or(Value::Null);
            let results = match facet.get_mut(RESULTS_FACET).map(Value::take) {
                Some(Value::Array(results)) => results,
                _ => Vec::new(),
            };
            let total = facet
                .get(TOTAL_FACET)
                .and_then(|t| t.get(0))
                .and_then(|g| g.get(GROUP_COUNT_FIELD))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            (results, total)
        } else {
            let total = docs.len() as u64;
            (docs, total)
        };

        let hits = results
            .into_iter()
            .map(|doc| Self::to_hit(doc, scored))
            .collect::<Result<Vec<_>>>()?;

        debug!("Pipeline returned {} of {} documents", hits.len(), total);
        Ok(RawPage { hits, total })
    }

    async fn facet(&self, query: &SearchQuery) -> Result<SearchFacets> {
        let stages = self.compiler.facet_pipeline(query)?;
        let docs = self.collection.aggregate(&stages).await?;

        let mut facets = SearchFacets::default();
        let Some(doc) = docs.first() else {
            return Ok(facets);
        };
        for dimension in FacetDimension::ALL {
            let groups = doc
                .get(dimension.name())
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            facets.set(dimension, finalize_buckets(dimension, group_pairs(groups)));
        }
        Ok(facets)
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>> {
        let stages = [
            PipelineStage::Match(vec![Predicate::In {
                field: ID_FIELD.to_string(),
                values: vec![id.to_string()],
            }]),
            PipelineStage::Limit(1),
        ];
        let mut docs = self.collection.aggregate(&stages).await?;
        match docs.pop() {
            Some(doc) => Ok(Some(Self::to_hit(doc, false)?.recipe)),
            None => Ok(None),
        }
    }
}
