//! Search backends
//!
//! Both backends answer the same compiled queries and are interchangeable
//! behind `SearchBackend`; which one runs is a startup decision.

mod aggregation;
mod fulltext;

pub use aggregation::*;
pub use fulltext::*;

use std::sync::Arc;

use async_trait::async_trait;
use larder_core::{Recipe, RecipeId};
use tracing::info;

use crate::compiler::{BackendQuery, QueryCompiler};
use crate::config::{BackendKind, EngineConfig};
use crate::error::{Result, SearchError};
use crate::facets::SearchFacets;
use crate::query::{SearchFilters, SearchQuery};

/// A recipe returned by a backend, before highlighting
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub recipe: Recipe,
    /// Relevance score; `None` for queries without text
    pub score: Option<f32>,
}

/// One page of backend hits plus the total match count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub hits: Vec<RawHit>,
    pub total: u64,
}

/// A store that can answer compiled recipe queries
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn compiler(&self) -> &QueryCompiler;

    /// Validate and compile a search for this backend
    fn compile(&self, query: &SearchQuery) -> Result<BackendQuery> {
        self.compiler().compile(query, self.kind())
    }

    /// Compile a title autocomplete query for this backend
    fn compile_suggest(&self, prefix: &str, limit: u32) -> Result<BackendQuery> {
        self.compiler().compile_suggest(prefix, limit, self.kind())
    }

    /// Run a compiled query
    async fn execute(&self, query: &BackendQuery) -> Result<RawPage>;

    /// Bucket counts for every facet dimension over the query's filtered set
    async fn facet(&self, query: &SearchQuery) -> Result<SearchFacets>;

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>>;

    /// Up to `limit` recipes matching `filters`, in id order
    async fn candidates(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<Recipe>> {
        let query = self.compiler().compile_candidates(filters, limit, self.kind())?;
        let page = self.execute(&query).await?;
        Ok(page.hits.into_iter().map(|hit| hit.recipe).collect())
    }
}

/// Build the configured backend over a recipe catalog
pub async fn build_backend(config: &EngineConfig, recipes: Vec<Recipe>) -> Result<Arc<dyn SearchBackend>> {
    let count = recipes.len();
    let backend: Arc<dyn SearchBackend> = match config.backend {
        BackendKind::Aggregation => {
            let collection = MemoryCollection::from_recipes(&recipes)?;
            Arc::new(AggregationBackend::new(Arc::new(collection), config))
        }
        BackendKind::FullText => {
            let index = match &config.index_dir {
                Some(dir) => RecipeIndex::open_or_create(dir)?,
                None => RecipeIndex::in_memory()?,
            };
            let index = Arc::new(index);
            let writer = index.clone();
            tokio::task::spawn_blocking(move || writer.rebuild(&recipes))
                .await
                .map_err(|e| SearchError::database(format!("indexing task failed: {}", e)))??;
            Arc::new(FullTextBackend::new(index, config))
        }
    };

    info!("Built {} backend over {} recipes", config.backend, count);
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::Difficulty;

    #[tokio::test]
    async fn test_build_each_backend() {
        let recipes = vec![
            Recipe::new("Pad thai").with_cuisine("thai").with_difficulty(Difficulty::Medium),
            Recipe::new("Green curry").with_cuisine("thai"),
        ];

        for kind in [BackendKind::Aggregation, BackendKind::FullText] {
            let config = EngineConfig {
                backend: kind,
                ..Default::default()
            };
            let backend = build_backend(&config, recipes.clone()).await.unwrap();
            assert_eq!(backend.kind(), kind);

            let found = backend.get_recipe(recipes[0].id).await.unwrap();
            assert_eq!(found.map(|r| r.title), Some("Pad thai".to_string()));

            let candidates = backend.candidates(&SearchFilters::default(), 10).await.unwrap();
            assert_eq!(candidates.len(), 2);
            assert!(candidates[0].id < candidates[1].id);
        }
    }

    #[tokio::test]
    async fn test_on_disk_index_drops_recipes_gone_from_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            backend: BackendKind::FullText,
            index_dir: Some(dir.path().join("index")),
            ..Default::default()
        };
        let soup = Recipe::new("Chicken soup");
        let pie = Recipe::new("Chicken pie");

        let first = build_backend(&config, vec![soup.clone(), pie.clone()]).await.unwrap();
        let query = SearchQuery::new().with_text("chicken");
        assert_eq!(first.execute(&first.compile(&query).unwrap()).await.unwrap().total, 2);
        drop(first);

        let rebuilt = build_backend(&config, vec![soup.clone()]).await.unwrap();
        let page = rebuilt.execute(&rebuilt.compile(&query).unwrap()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.hits[0].recipe.id, soup.id);
        assert!(rebuilt.get_recipe(pie.id).await.unwrap().is_none());
        assert_eq!(rebuilt.candidates(&SearchFilters::default(), 10).await.unwrap().len(), 1);
    }
}
