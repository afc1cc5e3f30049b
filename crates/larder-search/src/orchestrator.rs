//! Search orchestration
//!
//! `SearchOrchestrator` is the engine's entry point. It validates and
//! compiles queries, runs them on the configured backend, attaches
//! highlights and hands a performance record plus an analytics event to the
//! instrumentation queue for every call, whether it succeeded or not.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use larder_core::RecipeId;
use larder_scoring::{rank_recommendations, rank_similar, Recommendation, RecommendationContext, ScoredRecipe};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::backend::SearchBackend;
use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use crate::facets::SearchFacets;
use crate::highlight::highlight;
use crate::instrument::{InstrumentRecord, Instrumentation, Operation, PerformanceRecord, SearchEvent};
use crate::query::{total_pages, SearchFilters, SearchQuery, SearchResult, SearchResults};

/// Who is asking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

/// A results page and the facets of the same filtered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchWithFacets {
    pub results: SearchResults,
    pub facets: SearchFacets,
}

/// What an operation was asked, for instrumentation
struct Request {
    operation: Operation,
    query: String,
    filters: serde_json::Value,
    started: Instant,
}

impl Request {
    fn new(operation: Operation, query: impl Into<String>, filters: serde_json::Value) -> Self {
        Self {
            operation,
            query: query.into(),
            filters,
            started: Instant::now(),
        }
    }

    fn for_query(operation: Operation, query: &SearchQuery) -> Self {
        let filters = serde_json::to_value(&query.filters).unwrap_or(serde_json::Value::Null);
        Self::new(operation, query.text().unwrap_or_default(), filters)
    }
}

/// Entry point for search, facets, suggestions, similarity and recommendations
pub struct SearchOrchestrator {
    backend: Arc<dyn SearchBackend>,
    instrumentation: Instrumentation,
    config: EngineConfig,
}

impl SearchOrchestrator {
    pub fn new(backend: Arc<dyn SearchBackend>, instrumentation: Instrumentation, config: EngineConfig) -> Self {
        Self {
            backend,
            instrumentation,
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One page of results for `query`
    pub async fn search(&self, query: &SearchQuery, ctx: &RequestContext) -> Result<SearchResults> {
        let request = Request::for_query(Operation::Search, query);
        let outcome = self.run_search(query).await;
        self.finish(request, ctx, &outcome, |r| r.total);
        outcome
    }

    /// Facet buckets over the filtered set of `query`
    pub async fn facets(&self, query: &SearchQuery, ctx: &RequestContext) -> Result<SearchFacets> {
        let request = Request::for_query(Operation::Facets, query);
        let outcome = self.backend.facet(query).await;
        self.finish(request, ctx, &outcome, |f| f.bucket_count() as u64);
        outcome
    }

    /// Results and facets, fetched concurrently
    pub async fn search_with_facets(&self, query: &SearchQuery, ctx: &RequestContext) -> Result<SearchWithFacets> {
        let request = Request::for_query(Operation::SearchWithFacets, query);
        let outcome = tokio::try_join!(self.run_search(query), self.backend.facet(query))
            .map(|(results, facets)| SearchWithFacets { results, facets });
        self.finish(request, ctx, &outcome, |r| r.results.total);
        outcome
    }

    /// Distinct recipe titles completing `prefix`
    pub async fn suggest(&self, prefix: &str, limit: u32, ctx: &RequestContext) -> Result<Vec<String>> {
        let request = Request::new(Operation::Suggest, prefix, serde_json::Value::Null);
        let outcome = self.run_suggest(prefix, limit).await;
        self.finish(request, ctx, &outcome, |s| s.len() as u64);
        outcome
    }

    /// Recipes most similar to `recipe_id`
    pub async fn similar_recipes(&self, recipe_id: RecipeId, limit: u32, ctx: &RequestContext) -> Result<Vec<ScoredRecipe>> {
        let request = Request::new(Operation::SimilarRecipes, recipe_id.to_string(), serde_json::Value::Null);
        let outcome = self.run_similar(recipe_id, limit).await;
        self.finish(request, ctx, &outcome, |s| s.len() as u64);
        outcome
    }

    /// Recipes ranked for a user's context, with the factors behind each
    pub async fn recommend(
        &self,
        context: &RecommendationContext,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Recommendation>> {
        let filters = serde_json::to_value(context).unwrap_or(serde_json::Value::Null);
        let request = Request::new(Operation::Recommend, "", filters);
        let outcome = self.run_recommend(context, limit).await;
        self.finish(request, ctx, &outcome, |r| r.len() as u64);
        outcome
    }

    async fn run_search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let compiled = self.backend.compile(query)?;
        let page = self.backend.execute(&compiled).await?;

        let text = compiled.text.as_deref();
        let results = page
            .hits
            .into_iter()
            .map(|hit| SearchResult {
                highlights: text.map(|t| highlight(&hit.recipe, t)),
                score: text.and(hit.score),
                id: hit.recipe.id,
                title: hit.recipe.title,
                description: hit.recipe.description,
            })
            .collect();

        Ok(SearchResults {
            results,
            total: page.total,
            page: compiled.window.page,
            total_pages: total_pages(page.total, compiled.window.limit),
        })
    }

    async fn run_suggest(&self, prefix: &str, limit: u32) -> Result<Vec<String>> {
        if limit == 0 {
            return Err(SearchError::validation("limit must be a positive integer"));
        }
        // Repeated titles collapse below, so fetch a full page before truncating
        let cap = self.backend.compiler().max_page_size();
        let compiled = self.backend.compile_suggest(prefix, cap)?;
        let page = self.backend.execute(&compiled).await?;

        let mut titles: Vec<String> = Vec::new();
        for hit in page.hits {
            if !titles.contains(&hit.recipe.title) {
                titles.push(hit.recipe.title);
            }
        }
        titles.truncate(limit.min(cap) as usize);
        Ok(titles)
    }

    async fn run_similar(&self, recipe_id: RecipeId, limit: u32) -> Result<Vec<ScoredRecipe>> {
        let limit = self.ranking_limit(limit)?;
        let target = self
            .backend
            .get_recipe(recipe_id)
            .await?
            .ok_or(SearchError::NotFound(recipe_id))?;
        let candidates = self
            .backend
            .candidates(&SearchFilters::default(), self.config.candidate_pool)
            .await?;
        Ok(rank_similar(&target, &candidates, limit)?)
    }

    async fn run_recommend(&self, context: &RecommendationContext, limit: u32) -> Result<Vec<Recommendation>> {
        let limit = self.ranking_limit(limit)?;
        let candidates = self
            .backend
            .candidates(&SearchFilters::default(), self.config.candidate_pool)
            .await?;
        Ok(rank_recommendations(&candidates, context, limit)?)
    }

    fn ranking_limit(&self, limit: u32) -> Result<usize> {
        if limit == 0 {
            return Err(SearchError::validation("limit must be a positive integer"));
        }
        if limit > self.config.page_cap() {
            return Err(SearchError::validation(format!(
                "limit must not exceed {}",
                self.config.page_cap()
            )));
        }
        Ok(limit as usize)
    }

    /// Log the outcome and queue its records
    fn finish<T>(&self, request: Request, ctx: &RequestContext, outcome: &Result<T>, count: impl Fn(&T) -> u64) {
        let elapsed = request.started.elapsed();
        let operation = request.operation.as_str();

        let (successful, result_count, error) = match outcome {
            Ok(value) => (true, count(value), None),
            Err(e) if e.is_client_error() => {
                debug!("{} rejected: {}", operation, e);
                (false, 0, Some(e.to_string()))
            }
            Err(e) => {
                error!("{} failed on {} backend: {}", operation, self.backend.kind(), e);
                (false, 0, Some(e.to_string()))
            }
        };
        debug!("{} finished in {:?} ({} results)", operation, elapsed, result_count);

        let timestamp = Utc::now();
        self.instrumentation.emit(InstrumentRecord::Performance(PerformanceRecord {
            query: request.query.clone(),
            filters: request.filters.clone(),
            response_time_ms: elapsed.as_millis() as u64,
            timestamp,
            user_id: ctx.user_id.clone(),
            successful,
            result_count,
            cache_hit: false,
        }));
        self.instrumentation.emit(InstrumentRecord::Event(SearchEvent {
            operation: request.operation,
            query: request.query,
            filters: request.filters,
            backend: self.backend.kind(),
            result_count,
            user_id: ctx.user_id.clone(),
            successful,
            error,
            timestamp,
        }));
    }
}
