//! Engine configuration

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SearchError};

/// Hard upper bound on page size, regardless of configuration
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which backend answers queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Document-store aggregation pipeline; suited to filter-heavy, faceted queries
    #[default]
    Aggregation,
    /// Inverted index with weighted fuzzy relevance; suited to textual queries
    FullText,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Aggregation => f.write_str("aggregation"),
            BackendKind::FullText => f.write_str("full_text"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "aggregation" | "agg" => Ok(BackendKind::Aggregation),
            "full_text" | "fulltext" | "text" => Ok(BackendKind::FullText),
            other => Err(SearchError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Configuration for the search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend selected at startup
    pub backend: BackendKind,

    /// Largest page a caller may request (never above `MAX_PAGE_SIZE`)
    pub max_page_size: u32,

    /// Page size when the query does not specify one
    pub default_page_size: u32,

    /// Capacity of the analytics queue; records beyond it are dropped
    pub analytics_queue_capacity: usize,

    /// How many recipes similarity and recommendation rank over
    pub candidate_pool: usize,

    /// Directory for the full-text index (in memory when unset)
    pub index_dir: Option<PathBuf>,

    /// JSON-lines file analytics are appended to (tracing output when unset)
    pub analytics_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: 20,
            analytics_queue_capacity: 1024,
            candidate_pool: 500,
            index_dir: None,
            analytics_log: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file; missing keys take their defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let config: EngineConfig = serde_json::from_str(&json)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded engine config from {:?}", path);
        config.validated()
    }

    /// Apply `LARDER_*` environment overrides
    pub fn from_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, flags, tests)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(backend) = lookup("LARDER_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(size) = lookup("LARDER_MAX_PAGE_SIZE") {
            self.max_page_size = size
                .parse()
                .map_err(|_| SearchError::Config(format!("invalid LARDER_MAX_PAGE_SIZE '{}'", size)))?;
            // A smaller cap pulls the default page size down with it
            self.default_page_size = self.default_page_size.min(self.page_cap());
        }
        if let Some(path) = lookup("LARDER_ANALYTICS_LOG") {
            self.analytics_log = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("LARDER_INDEX_DIR") {
            self.index_dir = Some(PathBuf::from(path));
        }
        self.validated()
    }

    /// Effective maximum page size
    pub fn page_cap(&self) -> u32 {
        self.max_page_size.min(MAX_PAGE_SIZE)
    }

    fn validated(self) -> Result<Self> {
        if self.max_page_size == 0 {
            return Err(SearchError::Config("max_page_size must be at least 1".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.page_cap() {
            return Err(SearchError::Config(format!(
                "default_page_size must be between 1 and {}",
                self.page_cap()
            )));
        }
        if self.analytics_queue_capacity == 0 {
            return Err(SearchError::Config("analytics_queue_capacity must be at least 1".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("LARDER_BACKEND", "full-text"), ("LARDER_MAX_PAGE_SIZE", "50")]
            .into_iter()
            .collect();

        let config = EngineConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend, BackendKind::FullText);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_small_page_size_override_lowers_default() {
        let config = EngineConfig::default()
            .with_overrides(|key| (key == "LARDER_MAX_PAGE_SIZE").then(|| "5".to_string()))
            .unwrap();
        assert_eq!(config.max_page_size, 5);
        assert_eq!(config.default_page_size, 5);

        let zero = EngineConfig::default()
            .with_overrides(|key| (key == "LARDER_MAX_PAGE_SIZE").then(|| "0".to_string()));
        assert!(matches!(zero, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_page_cap_never_exceeds_hard_limit() {
        let config = EngineConfig {
            max_page_size: 10_000,
            ..Default::default()
        };
        assert_eq!(config.page_cap(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let result = EngineConfig::default().with_overrides(|key| {
            (key == "LARDER_BACKEND").then(|| "sql".to_string())
        });
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        tokio::fs::write(&path, r#"{ "backend": "full_text", "candidate_pool": 50 }"#)
            .await
            .unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.backend, BackendKind::FullText);
        assert_eq!(config.candidate_pool, 50);
        assert_eq!(config.default_page_size, 20);
    }
}
