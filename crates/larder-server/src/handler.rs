//! RPC method handlers

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::types::ErrorObjectOwned;
use larder_rpc::{
    to_rpc_error, HasUser, LarderApiServer, RecommendRequest, RecommendResponse, SearchRequest,
    SimilarRecipesRequest, SimilarRecipesResponse, SuggestRequest, SuggestResponse,
};
use larder_search::{SearchFacets, SearchOrchestrator, SearchResults, SearchWithFacets};
use tracing::debug;

/// RPC handler implementation
pub struct RpcHandler {
    orchestrator: Arc<SearchOrchestrator>,
}

impl RpcHandler {
    pub fn new(orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl LarderApiServer for RpcHandler {
    async fn search(&self, request: SearchRequest) -> Result<SearchResults, ErrorObjectOwned> {
        debug!("Searching for {:?}", request.query.text());

        self.orchestrator
            .search(&request.query, &request.request_context())
            .await
            .map_err(to_rpc_error)
    }

    async fn facets(&self, request: SearchRequest) -> Result<SearchFacets, ErrorObjectOwned> {
        debug!("Computing facets for {:?}", request.query.text());

        self.orchestrator
            .facets(&request.query, &request.request_context())
            .await
            .map_err(to_rpc_error)
    }

    async fn search_with_facets(&self, request: SearchRequest) -> Result<SearchWithFacets, ErrorObjectOwned> {
        debug!("Searching with facets for {:?}", request.query.text());

        self.orchestrator
            .search_with_facets(&request.query, &request.request_context())
            .await
            .map_err(to_rpc_error)
    }

    async fn suggest(&self, request: SuggestRequest) -> Result<SuggestResponse, ErrorObjectOwned> {
        debug!("Suggesting titles for '{}'", request.prefix);

        let suggestions = self
            .orchestrator
            .suggest(&request.prefix, request.limit, &request.request_context())
            .await
            .map_err(to_rpc_error)?;
        Ok(SuggestResponse { suggestions })
    }

    async fn similar_recipes(&self, request: SimilarRecipesRequest) -> Result<SimilarRecipesResponse, ErrorObjectOwned> {
        debug!("Finding recipes similar to {}", request.recipe_id);

        let recipes = self
            .orchestrator
            .similar_recipes(request.recipe_id, request.limit, &request.request_context())
            .await
            .map_err(to_rpc_error)?;
        Ok(SimilarRecipesResponse { recipes })
    }

    async fn recommend(&self, request: RecommendRequest) -> Result<RecommendResponse, ErrorObjectOwned> {
        debug!("Recommending {} recipes", request.limit);

        let recommendations = self
            .orchestrator
            .recommend(&request.context, request.limit, &request.request_context())
            .await
            .map_err(to_rpc_error)?;
        Ok(RecommendResponse { recommendations })
    }
}
