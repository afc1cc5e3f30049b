//! Request and response types

use larder_core::RecipeId;
use larder_scoring::{Recommendation, RecommendationContext, ScoredRecipe};
use larder_search::{RequestContext, SearchQuery};
use serde::{Deserialize, Serialize};

/// Results returned by ranking methods when the request gives no limit
pub const DEFAULT_RESULT_LIMIT: u32 = 10;

fn default_limit() -> u32 {
    DEFAULT_RESULT_LIMIT
}

/// Request for `search`, `facets` and `searchWithFacets`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: SearchQuery,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Request for title suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub prefix: String,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

/// Request for recipes similar to `recipe_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRecipesRequest {
    pub recipe_id: RecipeId,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRecipesResponse {
    pub recipes: Vec<ScoredRecipe>,
}

/// Request for recommendations in a user context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub context: RecommendationContext,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
}

/// Caller identity carried by a request
pub trait HasUser {
    fn user_id(&self) -> Option<&str>;

    fn request_context(&self) -> RequestContext {
        RequestContext {
            user_id: self.user_id().map(str::to_string),
        }
    }
}

macro_rules! impl_has_user {
    ($($request:ty),* $(,)?) => {
        $(impl HasUser for $request {
            fn user_id(&self) -> Option<&str> {
                self.user_id.as_deref()
            }
        })*
    };
}

impl_has_user!(SearchRequest, SuggestRequest, SimilarRecipesRequest, RecommendRequest);
