//! RPC method definitions using jsonrpsee

use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use larder_search::{SearchFacets, SearchResults, SearchWithFacets};

use crate::types::*;

/// Larder RPC API
///
/// Every method takes an optional `user_id` used only for analytics.
#[rpc(server, client, namespace = "larder")]
pub trait LarderApi {
    /// One page of results for a query
    #[method(name = "search")]
    async fn search(&self, request: SearchRequest) -> Result<SearchResults, ErrorObjectOwned>;

    /// Facet buckets over the query's filtered set
    #[method(name = "facets")]
    async fn facets(&self, request: SearchRequest) -> Result<SearchFacets, ErrorObjectOwned>;

    /// Results and facets in one call
    #[method(name = "searchWithFacets")]
    async fn search_with_facets(&self, request: SearchRequest) -> Result<SearchWithFacets, ErrorObjectOwned>;

    /// Title autocomplete
    #[method(name = "suggest")]
    async fn suggest(&self, request: SuggestRequest) -> Result<SuggestResponse, ErrorObjectOwned>;

    /// Recipes similar to a given recipe
    #[method(name = "similarRecipes")]
    async fn similar_recipes(&self, request: SimilarRecipesRequest) -> Result<SimilarRecipesResponse, ErrorObjectOwned>;

    /// Context-aware recommendations
    #[method(name = "recommend")]
    async fn recommend(&self, request: RecommendRequest) -> Result<RecommendResponse, ErrorObjectOwned>;
}
