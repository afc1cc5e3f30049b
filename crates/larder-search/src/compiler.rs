//! Query compilation
//!
//! Translates a validated `SearchQuery` into either an aggregation pipeline or
//! a structured full-text query. Filter predicates are built the same way for
//! both backends; only text matching and result shaping differ.

use crate::config::{BackendKind, EngineConfig};
use crate::error::{Result, SearchError};
use crate::facets::FacetDimension;
use crate::pipeline::{
    tokenize, PipelineStage, Predicate, SortKey, SortSpec, GROUP_COUNT_FIELD, GROUP_KEY_FIELD,
    ID_FIELD,
};
use crate::query::{SearchFilters, SearchQuery, SortDirection, SortOption};

/// Facet names used by the main search pipeline
pub const RESULTS_FACET: &str = "results";
pub const TOTAL_FACET: &str = "total";

/// Field suggestions are matched against
pub const SUGGEST_FIELD: &str = "title";

/// Page placement of a compiled query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
    pub skip: u64,
}

/// How free text is matched on the full-text path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Weighted multi-field match tolerant of small misspellings
    Fuzzy,
    /// Phrase whose last token is a prefix, for autocomplete
    PhrasePrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    pub tokens: Vec<String>,
    pub mode: TextMode,
}

/// Structured query for the full-text backend
#[derive(Debug, Clone, PartialEq)]
pub struct FullTextQuery {
    pub text: Option<TextMatch>,
    pub filters: Vec<Predicate>,
    /// Explicit ordering; relevance order when `None`
    pub sort: Option<Vec<SortSpec>>,
    pub skip: u64,
    pub limit: u64,
}

/// Backend-specific form of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Pipeline(Vec<PipelineStage>),
    FullText(FullTextQuery),
}

/// A compiled query, ready for `SearchBackend::execute`
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    pub window: PageWindow,
    /// Normalized free text, when the query had any
    pub text: Option<String>,
    pub plan: QueryPlan,
}

/// Compiles queries against the configured page limits
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    max_page_size: u32,
    default_page_size: u32,
}

impl QueryCompiler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_page_size: config.page_cap(),
            default_page_size: config.default_page_size.min(config.page_cap()),
        }
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Compile a search for the given backend
    pub fn compile(&self, query: &SearchQuery, kind: BackendKind) -> Result<BackendQuery> {
        query.validate(self.max_page_size)?;

        let window = self.window(query);
        let filters = self.filters(&query.filters)?;
        let tokens = match query.text() {
            Some(text) => Some(text_tokens(text)?),
            None => None,
        };

        let plan = match kind {
            BackendKind::Aggregation => {
                let mut predicates = Vec::with_capacity(filters.len() + 1);
                if let Some(tokens) = &tokens {
                    predicates.push(Predicate::Text {
                        tokens: tokens.clone(),
                    });
                }
                predicates.extend(filters);

                let mut page_stages = Vec::new();
                if let Some(sort) = self.sort(query) {
                    page_stages.push(PipelineStage::Sort(sort));
                }
                page_stages.push(PipelineStage::Skip(window.skip));
                page_stages.push(PipelineStage::Limit(window.limit as u64));

                QueryPlan::Pipeline(vec![
                    PipelineStage::Match(predicates),
                    PipelineStage::Facet(vec![
                        (RESULTS_FACET.to_string(), page_stages),
                        (TOTAL_FACET.to_string(), vec![PipelineStage::Group { key: None }]),
                    ]),
                ])
            }
            BackendKind::FullText => QueryPlan::FullText(FullTextQuery {
                text: tokens.map(|tokens| TextMatch {
                    tokens,
                    mode: TextMode::Fuzzy,
                }),
                filters,
                sort: query.sort.as_ref().map(explicit_sort),
                skip: window.skip,
                limit: window.limit as u64,
            }),
        };

        Ok(BackendQuery {
            window,
            text: query.text().map(str::to_string),
            plan,
        })
    }

    /// Compile a title autocomplete query
    pub fn compile_suggest(&self, prefix: &str, limit: u32, kind: BackendKind) -> Result<BackendQuery> {
        if limit == 0 {
            return Err(SearchError::validation("limit must be a positive integer"));
        }
        let tokens = text_tokens(prefix)?;
        let limit = limit.min(self.max_page_size);
        let window = PageWindow {
            page: 1,
            limit,
            skip: 0,
        };

        let plan = match kind {
            BackendKind::Aggregation => QueryPlan::Pipeline(vec![
                PipelineStage::Match(vec![Predicate::PhrasePrefix {
                    field: SUGGEST_FIELD.to_string(),
                    tokens,
                }]),
                PipelineStage::Sort(vec![
                    SortSpec::field(SUGGEST_FIELD, SortDirection::Asc),
                    SortSpec::field(ID_FIELD, SortDirection::Asc),
                ]),
                PipelineStage::Limit(limit as u64),
            ]),
            BackendKind::FullText => QueryPlan::FullText(FullTextQuery {
                text: Some(TextMatch {
                    tokens,
                    mode: TextMode::PhrasePrefix,
                }),
                filters: Vec::new(),
                sort: Some(vec![
                    SortSpec::field(SUGGEST_FIELD, SortDirection::Asc),
                    SortSpec::field(ID_FIELD, SortDirection::Asc),
                ]),
                skip: 0,
                limit: limit as u64,
            }),
        };

        Ok(BackendQuery {
            window,
            text: None,
            plan,
        })
    }

    /// Compile an unpaged candidate fetch for scoring
    pub fn compile_candidates(&self, filters: &SearchFilters, limit: usize, kind: BackendKind) -> Result<BackendQuery> {
        let predicates = self.filters(filters)?;
        let limit = limit.max(1) as u64;
        let window = PageWindow {
            page: 1,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
            skip: 0,
        };
        let by_id = vec![SortSpec::field(ID_FIELD, SortDirection::Asc)];

        let plan = match kind {
            BackendKind::Aggregation => QueryPlan::Pipeline(vec![
                PipelineStage::Match(predicates),
                PipelineStage::Sort(by_id),
                PipelineStage::Limit(limit),
            ]),
            BackendKind::FullText => QueryPlan::FullText(FullTextQuery {
                text: None,
                filters: predicates,
                sort: Some(by_id),
                skip: 0,
                limit,
            }),
        };

        Ok(BackendQuery {
            window,
            text: None,
            plan,
        })
    }

    /// Compile the facet pipeline over the query's filtered set
    pub fn facet_pipeline(&self, query: &SearchQuery) -> Result<Vec<PipelineStage>> {
        query.validate(self.max_page_size)?;

        let mut predicates = Vec::new();
        if let Some(text) = query.text() {
            predicates.push(Predicate::Text {
                tokens: text_tokens(text)?,
            });
        }
        predicates.extend(self.filters(&query.filters)?);

        let facets = FacetDimension::ALL
            .iter()
            .map(|dimension| {
                let mut stages = Vec::new();
                if dimension.is_array() {
                    stages.push(PipelineStage::Unwind(dimension.field().to_string()));
                }
                stages.push(PipelineStage::Group {
                    key: Some(dimension.field().to_string()),
                });
                stages.push(PipelineStage::Sort(vec![
                    SortSpec::field(GROUP_COUNT_FIELD, SortDirection::Desc),
                    SortSpec::field(GROUP_KEY_FIELD, SortDirection::Asc),
                ]));
                if let Some(cap) = dimension.cap() {
                    stages.push(PipelineStage::Limit(cap as u64));
                }
                (dimension.name().to_string(), stages)
            })
            .collect();

        Ok(vec![PipelineStage::Match(predicates), PipelineStage::Facet(facets)])
    }

    /// Where the requested page sits; the limit is clamped even after validation
    pub fn window(&self, query: &SearchQuery) -> PageWindow {
        let page = query.page().max(1);
        let limit = query
            .limit_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        PageWindow {
            page,
            limit,
            skip: (page as u64 - 1) * limit as u64,
        }
    }

    /// Backend-independent filter predicates
    pub fn filters(&self, filters: &SearchFilters) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::new();

        if !filters.category.is_empty() {
            predicates.push(Predicate::In {
                field: "meal_type".to_string(),
                values: filters.category.clone(),
            });
        }

        if !filters.cuisine.is_empty() {
            predicates.push(Predicate::In {
                field: "cuisine".to_string(),
                values: filters.cuisine.clone(),
            });
        }

        if !filters.difficulty.is_empty() {
            predicates.push(Predicate::In {
                field: "difficulty".to_string(),
                values: filters
                    .difficulties()?
                    .iter()
                    .map(|d| d.as_str().to_string())
                    .collect(),
            });
        }

        if !filters.ingredients.is_empty() {
            predicates.push(Predicate::All {
                field: "ingredients.name".to_string(),
                values: filters.ingredients.clone(),
            });
        }

        if let Some(range) = filters.time {
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(SearchError::validation("time.min must not exceed time.max"));
                }
            }
            if range.min.is_some() || range.max.is_some() {
                predicates.push(Predicate::TotalTime {
                    min: range.min,
                    max: range.max,
                });
            }
        }

        Ok(predicates)
    }

    /// Ordering for the aggregation path, `None` for backend default order
    pub fn sort(&self, query: &SearchQuery) -> Option<Vec<SortSpec>> {
        match &query.sort {
            Some(sort) => Some(explicit_sort(sort)),
            None if query.text().is_some() => Some(vec![
                SortSpec::new(SortKey::Score, SortDirection::Desc),
                SortSpec::field(ID_FIELD, SortDirection::Asc),
            ]),
            None => None,
        }
    }
}

/// Caller-requested sort followed by an id tie-breaker
fn explicit_sort(sort: &SortOption) -> Vec<SortSpec> {
    let key = sort_key(&sort.field);
    let mut specs = vec![SortSpec::new(key.clone(), sort.direction)];
    if key != SortKey::Field(ID_FIELD.to_string()) {
        specs.push(SortSpec::field(ID_FIELD, SortDirection::Asc));
    }
    specs
}

fn sort_key(field: &str) -> SortKey {
    match field.trim() {
        "score" | "relevance" => SortKey::Score,
        "total_time" | "totalTime" => SortKey::TotalTime,
        "rating" => SortKey::Field("ratings.average".to_string()),
        other => SortKey::Field(other.to_string()),
    }
}

fn text_tokens(text: &str) -> Result<Vec<String>> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(SearchError::validation("text contains no searchable terms"));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> QueryCompiler {
        QueryCompiler::new(&EngineConfig::default())
    }

    #[test]
    fn test_window_math() {
        let window = compiler().window(&SearchQuery::new().with_page(3).with_limit(10));
        assert_eq!(window, PageWindow { page: 3, limit: 10, skip: 20 });

        let defaults = compiler().window(&SearchQuery::new());
        assert_eq!(defaults, PageWindow { page: 1, limit: 20, skip: 0 });
    }

    #[test]
    fn test_window_clamps_limit() {
        let config = EngineConfig {
            max_page_size: 25,
            default_page_size: 10,
            ..Default::default()
        };
        let compiler = QueryCompiler::new(&config);

        // bypasses validation on purpose
        let window = compiler.window(&SearchQuery::new().with_limit(500));
        assert_eq!(window.limit, 25);
    }

    #[test]
    fn test_filters_compile_to_predicates() {
        let filters = SearchFilters::default()
            .with_category(&["dinner"])
            .with_cuisine(&["thai", "lao"])
            .with_difficulty(&["Easy"])
            .with_ingredients(&["rice", "lime"])
            .with_time(None, Some(30));

        let predicates = compiler().filters(&filters).unwrap();
        assert_eq!(
            predicates,
            vec![
                Predicate::In { field: "meal_type".into(), values: vec!["dinner".into()] },
                Predicate::In { field: "cuisine".into(), values: vec!["thai".into(), "lao".into()] },
                Predicate::In { field: "difficulty".into(), values: vec!["easy".into()] },
                Predicate::All { field: "ingredients.name".into(), values: vec!["rice".into(), "lime".into()] },
                Predicate::TotalTime { min: None, max: Some(30) },
            ]
        );
    }

    #[test]
    fn test_inverted_time_range_fails_before_compiling() {
        let query = SearchQuery::new().with_filters(SearchFilters::default().with_time(Some(90), Some(10)));
        let err = compiler().compile(&query, BackendKind::Aggregation).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_text_pipeline_sorts_by_score_then_id() {
        let query = SearchQuery::new().with_text("Spicy chicken").with_page(2).with_limit(5);
        let compiled = compiler().compile(&query, BackendKind::Aggregation).unwrap();

        let QueryPlan::Pipeline(stages) = compiled.plan else {
            panic!("expected a pipeline");
        };
        assert_eq!(
            stages[0],
            PipelineStage::Match(vec![Predicate::Text {
                tokens: vec!["spicy".into(), "chicken".into()]
            }])
        );
        let PipelineStage::Facet(facets) = &stages[1] else {
            panic!("expected a facet stage");
        };
        assert_eq!(facets[0].0, RESULTS_FACET);
        assert_eq!(
            facets[0].1,
            vec![
                PipelineStage::Sort(vec![
                    SortSpec::new(SortKey::Score, SortDirection::Desc),
                    SortSpec::field(ID_FIELD, SortDirection::Asc),
                ]),
                PipelineStage::Skip(5),
                PipelineStage::Limit(5),
            ]
        );
        assert_eq!(facets[1].1, vec![PipelineStage::Group { key: None }]);
        assert_eq!(compiled.text.as_deref(), Some("Spicy chicken"));
    }

    #[test]
    fn test_no_text_no_sort_leaves_order_to_backend() {
        let compiled = compiler().compile(&SearchQuery::new(), BackendKind::Aggregation).unwrap();
        let QueryPlan::Pipeline(stages) = compiled.plan else {
            panic!("expected a pipeline");
        };
        let PipelineStage::Facet(facets) = &stages[1] else {
            panic!("expected a facet stage");
        };
        assert_eq!(facets[0].1, vec![PipelineStage::Skip(0), PipelineStage::Limit(20)]);
    }

    #[test]
    fn test_full_text_compilation() {
        let query = SearchQuery::new()
            .with_text("chiken")
            .with_sort("total_time", SortDirection::Asc)
            .with_filters(SearchFilters::default().with_cuisine(&["mexican"]));
        let compiled = compiler().compile(&query, BackendKind::FullText).unwrap();

        let QueryPlan::FullText(ft) = compiled.plan else {
            panic!("expected a full-text query");
        };
        assert_eq!(
            ft.text,
            Some(TextMatch { tokens: vec!["chiken".into()], mode: TextMode::Fuzzy })
        );
        assert_eq!(ft.filters.len(), 1);
        assert_eq!(
            ft.sort,
            Some(vec![
                SortSpec::new(SortKey::TotalTime, SortDirection::Asc),
                SortSpec::field(ID_FIELD, SortDirection::Asc),
            ])
        );
    }

    #[test]
    fn test_punctuation_only_text_rejected() {
        let query = SearchQuery::new().with_text("?!");
        assert!(compiler().compile(&query, BackendKind::FullText).is_err());
    }

    #[test]
    fn test_facet_pipeline_unwinds_array_dimensions() {
        let stages = compiler().facet_pipeline(&SearchQuery::new()).unwrap();
        let PipelineStage::Facet(facets) = &stages[1] else {
            panic!("expected a facet stage");
        };

        let tags = facets.iter().find(|(name, _)| name == "tags").unwrap();
        assert_eq!(tags.1[0], PipelineStage::Unwind("tags".into()));
        assert_eq!(tags.1.last(), Some(&PipelineStage::Limit(30)));

        let difficulty = facets.iter().find(|(name, _)| name == "difficulty").unwrap();
        assert!(!difficulty.1.iter().any(|s| matches!(s, PipelineStage::Limit(_))));
    }

    #[test]
    fn test_suggest_uses_phrase_prefix() {
        let compiled = compiler().compile_suggest("chicken ti", 5, BackendKind::FullText).unwrap();
        let QueryPlan::FullText(ft) = compiled.plan else {
            panic!("expected a full-text query");
        };
        assert_eq!(ft.text.unwrap().mode, TextMode::PhrasePrefix);
        assert_eq!(ft.limit, 5);
    }
}
