//! RPC client implementation

use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use larder_core::RecipeId;
use larder_rpc::{
    LarderApiClient, RecommendRequest, SearchRequest, SimilarRecipesRequest, SuggestRequest,
};
use larder_scoring::{Recommendation, RecommendationContext, ScoredRecipe};
use larder_search::{SearchFacets, SearchQuery, SearchResults, SearchWithFacets};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};

/// Server used when `LARDER_SERVER` is not set
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9877";

/// Client for connecting to a Larder server
pub struct LarderClient {
    client: HttpClient,
    base_url: Url,
    /// Sent with every request for analytics attribution
    user_id: Option<String>,
}

impl LarderClient {
    /// Connect to a Larder server
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let base_url: Url = url
            .as_ref()
            .parse()
            .map_err(|e| ClientError::Connection(format!("Invalid URL: {}", e)))?;

        let client = HttpClientBuilder::default()
            .build(base_url.as_str())
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        debug!("Connected to Larder server at {}", base_url);

        Ok(Self {
            client,
            base_url,
            user_id: None,
        })
    }

    /// Connect to `LARDER_SERVER`, or the default local server
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("LARDER_SERVER").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::connect(url).await
    }

    /// Attribute subsequent requests to a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Get the server URL
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn search_request(&self, query: SearchQuery) -> SearchRequest {
        SearchRequest {
            query,
            user_id: self.user_id.clone(),
        }
    }

    /// One page of matching recipes
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResults> {
        Ok(self.client.search(self.search_request(query)).await?)
    }

    /// Bucket counts over the filtered set
    pub async fn facets(&self, query: SearchQuery) -> Result<SearchFacets> {
        Ok(self.client.facets(self.search_request(query)).await?)
    }

    pub async fn search_with_facets(&self, query: SearchQuery) -> Result<SearchWithFacets> {
        Ok(self.client.search_with_facets(self.search_request(query)).await?)
    }

    /// Recipe titles starting with `prefix`
    pub async fn suggest(&self, prefix: impl Into<String>, limit: u32) -> Result<Vec<String>> {
        let request = SuggestRequest {
            prefix: prefix.into(),
            limit,
            user_id: self.user_id.clone(),
        };

        let response = self.client.suggest(request).await?;
        Ok(response.suggestions)
    }

    pub async fn similar_recipes(&self, recipe_id: RecipeId, limit: u32) -> Result<Vec<ScoredRecipe>> {
        let request = SimilarRecipesRequest {
            recipe_id,
            limit,
            user_id: self.user_id.clone(),
        };

        let response = self.client.similar_recipes(request).await?;
        Ok(response.recipes)
    }

    pub async fn recommend(&self, context: RecommendationContext, limit: u32) -> Result<Vec<Recommendation>> {
        let request = RecommendRequest {
            context,
            limit,
            user_id: self.user_id.clone(),
        };

        let response = self.client.recommend(request).await?;
        Ok(response.recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_parses_url() {
        let client = LarderClient::connect("http://127.0.0.1:9999").await.unwrap().with_user("cook");
        assert_eq!(client.url().port(), Some(9999));
        assert_eq!(client.user_id(), Some("cook"));
        assert_eq!(client.search_request(SearchQuery::new()).user_id.as_deref(), Some("cook"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let result = LarderClient::connect("not a url").await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_rpc_error() {
        // port 9 (discard) is closed on test machines
        let client = LarderClient::connect("http://127.0.0.1:9").await.unwrap();
        let result = client.suggest("soup", 5).await;
        assert!(matches!(result, Err(ClientError::Rpc(_))));
    }
}
