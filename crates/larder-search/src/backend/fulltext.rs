//! Full-text backend over a Tantivy index
//!
//! Text fields are tokenized with Tantivy's default tokenizer; filter and
//! facet fields are indexed raw with fast-field storage. The full recipe is
//! kept in a stored `source` field so hits never need a second lookup.

use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use larder_core::{Recipe, RecipeId};
use serde_json::{json, Value as JsonValue};
use tantivy::aggregation::agg_req::Aggregations;
use tantivy::aggregation::agg_result::AggregationResults;
use tantivy::aggregation::{AggregationCollector, AggregationLimits};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, FuzzyTermQuery, Occur, PhrasePrefixQuery, Query,
    RangeQuery, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, FAST, INDEXED, STORED, STRING, TEXT};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{RawHit, RawPage, SearchBackend};
use crate::compiler::{BackendQuery, FullTextQuery, QueryCompiler, QueryPlan, TextMatch, TextMode};
use crate::config::{BackendKind, EngineConfig};
use crate::error::{Result, SearchError};
use crate::facets::{finalize_buckets, FacetDimension, SearchFacets};
use crate::pipeline::{compare_documents, Predicate, TextField, SCORE_FIELD};
use crate::query::SearchQuery;

/// Writer heap budget in bytes
const WRITER_HEAP: usize = 50_000_000;

/// Terms requested per facet before capping; large enough to be exhaustive
const FACET_TERMS_SIZE: u32 = 10_000;

/// Schema fields of the recipe index
#[derive(Debug, Clone, Copy)]
pub struct RecipeFields {
    pub id: Field,
    pub title: Field,
    pub description: Field,
    pub ingredients: Field,
    pub tags: Field,
    pub ingredient_name: Field,
    pub tag: Field,
    pub cuisine: Field,
    pub meal_type: Field,
    pub difficulty: Field,
    pub dietary_restrictions: Field,
    pub total_time: Field,
    pub source: Field,
}

impl RecipeFields {
    fn build() -> (Schema, Self) {
        let mut builder = Schema::builder();

        let fields = Self {
            id: builder.add_text_field("id", STRING | STORED | FAST),

            // Weighted free-text fields
            title: builder.add_text_field("title", TEXT),
            description: builder.add_text_field("description", TEXT),
            ingredients: builder.add_text_field("ingredients", TEXT),
            tags: builder.add_text_field("tags", TEXT),

            // Exact-match filter and facet fields
            ingredient_name: builder.add_text_field("ingredient_name", STRING),
            tag: builder.add_text_field("tag", STRING | FAST),
            cuisine: builder.add_text_field("cuisine", STRING | FAST),
            meal_type: builder.add_text_field("meal_type", STRING | FAST),
            difficulty: builder.add_text_field("difficulty", STRING | FAST),
            dietary_restrictions: builder.add_text_field("dietary_restrictions", STRING | FAST),
            total_time: builder.add_u64_field("total_time", INDEXED | STORED | FAST),

            source: builder.add_text_field("source", STORED),
        };

        (builder.build(), fields)
    }

    fn text(&self, field: TextField) -> Field {
        match field {
            TextField::Title => self.title,
            TextField::Description => self.description,
            TextField::IngredientNames => self.ingredients,
            TextField::Tags => self.tags,
        }
    }

    /// Raw field an exact-match predicate on `path` runs against
    fn exact(&self, path: &str) -> Result<Field> {
        match path {
            "id" => Ok(self.id),
            "cuisine" => Ok(self.cuisine),
            "meal_type" => Ok(self.meal_type),
            "difficulty" => Ok(self.difficulty),
            "dietary_restrictions" => Ok(self.dietary_restrictions),
            "tags" => Ok(self.tag),
            "ingredients.name" => Ok(self.ingredient_name),
            other => Err(SearchError::database(format!("field '{}' is not filterable in the index", other))),
        }
    }

    /// Fast field name backing a facet dimension
    fn facet_field(dimension: FacetDimension) -> &'static str {
        match dimension {
            FacetDimension::Tags => "tag",
            other => other.field(),
        }
    }

    fn document(&self, recipe: &Recipe) -> Result<TantivyDocument> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id, recipe.id.to_string());
        doc.add_text(self.title, &recipe.title);
        doc.add_text(self.description, &recipe.description);

        for name in recipe.ingredient_names() {
            doc.add_text(self.ingredients, name);
            doc.add_text(self.ingredient_name, name);
        }
        for tag in &recipe.tags {
            doc.add_text(self.tags, tag);
            if !tag.is_empty() {
                doc.add_text(self.tag, tag);
            }
        }
        for restriction in recipe.dietary_restrictions.iter().filter(|r| !r.is_empty()) {
            doc.add_text(self.dietary_restrictions, restriction);
        }
        if let Some(cuisine) = recipe.cuisine.as_deref().filter(|c| !c.is_empty()) {
            doc.add_text(self.cuisine, cuisine);
        }
        if let Some(meal_type) = recipe.meal_type.as_deref().filter(|m| !m.is_empty()) {
            doc.add_text(self.meal_type, meal_type);
        }
        if let Some(difficulty) = recipe.difficulty {
            doc.add_text(self.difficulty, difficulty.as_str());
        }
        doc.add_u64(self.total_time, recipe.total_time() as u64);
        doc.add_text(self.source, serde_json::to_string(recipe)?);
        Ok(doc)
    }
}

/// Tantivy index of recipes
pub struct RecipeIndex {
    index: Index,
    fields: RecipeFields,
    writer: Mutex<IndexWriter>,
    reader: OnceCell<IndexReader>,
}

impl RecipeIndex {
    /// Create an in-memory index
    pub fn in_memory() -> Result<Self> {
        let (schema, fields) = RecipeFields::build();
        Self::with_index(Index::create_in_ram(schema), fields)
    }

    /// Open the index in `path`, creating it when absent
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let (schema, fields) = RecipeFields::build();
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, schema)?
        };
        info!("Opened recipe index at {:?}", path);
        Self::with_index(index, fields)
    }

    fn with_index(index: Index, fields: RecipeFields) -> Result<Self> {
        let writer: IndexWriter = index.writer(WRITER_HEAP)?;
        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader: OnceCell::new(),
        })
    }

    pub fn fields(&self) -> RecipeFields {
        self.fields
    }

    /// Add or replace recipes and commit. Blocking.
    pub fn index_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SearchError::database("index writer lock poisoned"))?;

        for recipe in recipes {
            writer.delete_term(Term::from_field_text(self.fields.id, &recipe.id.to_string()));
            writer.add_document(self.fields.document(recipe)?)?;
        }
        writer.commit()?;

        if let Some(reader) = self.reader.get() {
            reader.reload()?;
        }
        debug!("Indexed {} recipes", recipes.len());
        Ok(())
    }

    /// Replace the whole index content with `recipes` in one commit. Blocking.
    pub fn rebuild(&self, recipes: &[Recipe]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SearchError::database("index writer lock poisoned"))?;

        writer.delete_all_documents()?;
        for recipe in recipes {
            writer.add_document(self.fields.document(recipe)?)?;
        }
        writer.commit()?;

        if let Some(reader) = self.reader.get() {
            reader.reload()?;
        }
        info!("Rebuilt recipe index with {} recipes", recipes.len());
        Ok(())
    }

    /// Remove a recipe and commit. Blocking.
    pub fn remove_recipe(&self, id: RecipeId) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SearchError::database("index writer lock poisoned"))?;
        writer.delete_term(Term::from_field_text(self.fields.id, &id.to_string()));
        writer.commit()?;

        if let Some(reader) = self.reader.get() {
            reader.reload()?;
        }
        Ok(())
    }

    async fn reader(&self) -> Result<&IndexReader> {
        self.reader
            .get_or_try_init(|| async {
                debug!("Opening recipe index reader");
                self.index
                    .reader_builder()
                    .reload_policy(ReloadPolicy::OnCommitWithDelay)
                    .try_into()
                    .map_err(SearchError::from)
            })
            .await
    }

    /// Run `f` against a fresh searcher on the blocking pool
    async fn with_searcher<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Searcher, &RecipeFields) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let searcher = self.reader().await?.searcher();
        let fields = self.fields;
        tokio::task::spawn_blocking(move || f(&searcher, &fields))
            .await
            .map_err(|e| SearchError::database(format!("index search task failed: {}", e)))?
    }
}

/// AUTO fuzziness: exact for short tokens, more edits for longer ones
fn fuzzy_distance(token: &str) -> u8 {
    match token.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn text_query(fields: &RecipeFields, text: &TextMatch) -> Result<Box<dyn Query>> {
    match text.mode {
        TextMode::Fuzzy => {
            let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
            for token in &text.tokens {
                for field in TextField::ALL {
                    let term = Term::from_field_text(fields.text(field), token);
                    let fuzzy = FuzzyTermQuery::new(term, fuzzy_distance(token), true);
                    clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(fuzzy), field.weight()))));
                }
            }
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
        TextMode::PhrasePrefix => match text.tokens.as_slice() {
            [] => Err(SearchError::validation("empty prefix")),
            [single] => Ok(Box::new(RegexQuery::from_pattern(&format!("{}.*", single), fields.title)?)),
            tokens => {
                let terms = tokens
                    .iter()
                    .map(|t| Term::from_field_text(fields.title, t))
                    .collect();
                Ok(Box::new(PhrasePrefixQuery::new(terms)))
            }
        },
    }
}

fn filter_query(fields: &RecipeFields, predicate: &Predicate) -> Result<Box<dyn Query>> {
    let term = |field: Field, value: &str| -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        ))
    };

    let query: Box<dyn Query> = match predicate {
        Predicate::In { field, values } => {
            let field = fields.exact(field)?;
            Box::new(BooleanQuery::new(
                values.iter().map(|v| (Occur::Should, term(field, v))).collect(),
            ))
        }
        Predicate::All { field, values } => {
            let field = fields.exact(field)?;
            Box::new(BooleanQuery::new(
                values.iter().map(|v| (Occur::Must, term(field, v))).collect(),
            ))
        }
        Predicate::TotalTime { min, max } => Box::new(RangeQuery::new_u64_bounds(
            "total_time".to_string(),
            min.map_or(Bound::Unbounded, |m| Bound::Included(m as u64)),
            max.map_or(Bound::Unbounded, |m| Bound::Included(m as u64)),
        )),
        Predicate::Text { .. } | Predicate::PhrasePrefix { .. } => {
            return Err(SearchError::database("text predicates cannot be used as index filters"))
        }
    };

    Ok(Box::new(ConstScoreQuery::new(query, 0.0)))
}

fn build_query(fields: &RecipeFields, query: &FullTextQuery) -> Result<Box<dyn Query>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
    if let Some(text) = &query.text {
        clauses.push((Occur::Must, text_query(fields, text)?));
    }
    for predicate in &query.filters {
        clauses.push((Occur::Must, filter_query(fields, predicate)?));
    }

    if clauses.is_empty() {
        return Ok(Box::new(AllQuery));
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

fn load_source(searcher: &Searcher, fields: &RecipeFields, address: DocAddress) -> Result<JsonValue> {
    let doc: TantivyDocument = searcher.doc(address)?;
    let source = doc
        .get_first(fields.source)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SearchError::database("indexed recipe has no stored source"))?;
    Ok(serde_json::from_str(source)?)
}

fn to_hit(source: JsonValue, score: Option<f32>) -> Result<RawHit> {
    let recipe: Recipe = serde_json::from_value(source)
        .map_err(|e| SearchError::database(format!("malformed stored recipe: {}", e)))?;
    Ok(RawHit { recipe, score })
}

fn run_query(searcher: &Searcher, fields: &RecipeFields, query: &FullTextQuery, scored: bool) -> Result<RawPage> {
    let tantivy_query = build_query(fields, query)?;
    let limit = query.limit.max(1) as usize;
    let skip = query.skip as usize;

    // TopDocs preallocates limit + offset slots, so never size it past the match count
    let total = searcher.search(&*tantivy_query, &Count)?;
    if total == 0 || skip >= total {
        return Ok(RawPage {
            hits: Vec::new(),
            total: total as u64,
        });
    }

    let Some(sort) = &query.sort else {
        let collector = TopDocs::with_limit(limit.min(total - skip)).and_offset(skip);
        let hits = searcher
            .search(&*tantivy_query, &collector)?
            .into_iter()
            .map(|(score, address)| to_hit(load_source(searcher, fields, address)?, scored.then_some(score)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(RawPage {
            hits,
            total: total as u64,
        });
    };

    // Explicit orderings are applied over the whole match set
    let all = searcher.search(&*tantivy_query, &TopDocs::with_limit(total))?;

    let mut docs = Vec::with_capacity(all.len());
    for (score, address) in all {
        let mut source = load_source(searcher, fields, address)?;
        if let JsonValue::Object(map) = &mut source {
            map.insert(SCORE_FIELD.to_string(), json!(score));
        }
        docs.push((source, score));
    }
    docs.sort_by(|(a, _), (b, _)| compare_documents(a, b, sort));

    let hits = docs
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(source, score)| to_hit(source, scored.then_some(score)))
        .collect::<Result<Vec<_>>>()?;
    Ok(RawPage {
        hits,
        total: total as u64,
    })
}

fn facet_aggregations() -> Result<Aggregations> {
    let mut request = serde_json::Map::new();
    for dimension in FacetDimension::ALL {
        request.insert(
            dimension.name().to_string(),
            json!({
                "terms": {
                    "field": RecipeFields::facet_field(dimension),
                    "size": FACET_TERMS_SIZE,
                }
            }),
        );
    }
    Ok(serde_json::from_value(JsonValue::Object(request))?)
}

/// Backend answering queries from a `RecipeIndex`
pub struct FullTextBackend {
    index: Arc<RecipeIndex>,
    compiler: QueryCompiler,
}

impl FullTextBackend {
    pub fn new(index: Arc<RecipeIndex>, config: &EngineConfig) -> Self {
        Self {
            index,
            compiler: QueryCompiler::new(config),
        }
    }

    pub fn index(&self) -> &Arc<RecipeIndex> {
        &self.index
    }
}

#[async_trait]
impl SearchBackend for FullTextBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FullText
    }

    fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    async fn execute(&self, query: &BackendQuery) -> Result<RawPage> {
        let QueryPlan::FullText(full_text) = &query.plan else {
            return Err(SearchError::database("full-text backend received an aggregation pipeline"));
        };
        let full_text = full_text.clone();
        let scored = query.text.is_some();

        let page = self
            .index
            .with_searcher(move |searcher, fields| run_query(searcher, fields, &full_text, scored))
            .await?;
        debug!("Index returned {} of {} recipes", page.hits.len(), page.total);
        Ok(page)
    }

    async fn facet(&self, query: &SearchQuery) -> Result<SearchFacets> {
        let compiled = self.compiler.compile(query, BackendKind::FullText)?;
        let QueryPlan::FullText(full_text) = compiled.plan else {
            return Err(SearchError::database("facet query did not compile to a full-text query"));
        };

        let results = self
            .index
            .with_searcher(move |searcher, fields| {
                let tantivy_query = build_query(fields, &full_text)?;
                let collector = AggregationCollector::from_aggs(facet_aggregations()?, AggregationLimits::default());
                let results: AggregationResults = searcher.search(&*tantivy_query, &collector)?;
                Ok(serde_json::to_value(&results)?)
            })
            .await?;

        let mut facets = SearchFacets::default();
        for dimension in FacetDimension::ALL {
            let buckets = results
                .get(dimension.name())
                .and_then(|agg| agg.get("buckets"))
                .and_then(JsonValue::as_array)
                .map(|buckets| {
                    buckets
                        .iter()
                        .map(|b| {
                            let key = b.get("key").cloned().unwrap_or(JsonValue::Null);
                            let count = b.get("doc_count").and_then(JsonValue::as_u64).unwrap_or(0);
                            (key, count)
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            facets.set(dimension, finalize_buckets(dimension, buckets));
        }
        Ok(facets)
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>> {
        let id = id.to_string();
        self.index
            .with_searcher(move |searcher, fields| {
                let query = TermQuery::new(Term::from_field_text(fields.id, &id), IndexRecordOption::Basic);
                let top = searcher.search(&query, &TopDocs::with_limit(1))?;
                match top.first() {
                    Some((_, address)) => Ok(Some(to_hit(load_source(searcher, fields, *address)?, None)?.recipe)),
                    None => Ok(None),
                }
            })
            .await
    }
}
