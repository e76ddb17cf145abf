//! End-to-end search: validate, fan out, deduplicate, assemble.

use crate::assemble::{assemble, SearchResponse};
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::{LitSearchError, Result};
use crate::fanout;
use crate::paper::{Profile, SourceId};
use crate::sources::SourceRegistry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Inbound search request (CLI arguments or `POST /search` body).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    /// Source ids. Omitted means the profile defaults; an empty list is an error.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    /// Per-source cap. Omitted means the configured default.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_sources(mut self, sources: &[SourceId]) -> Self {
        self.sources = Some(sources.iter().map(|s| s.as_str().to_string()).collect());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// A request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub query: String,
    /// Distinct ids in request order
    pub sources: Vec<SourceId>,
    pub max_results: usize,
}

pub struct LiteratureSearch {
    registry: SourceRegistry,
    dedup: Deduplicator,
    profile: Profile,
    default_max_results: usize,
    source_timeout: Option<Duration>,
}

impl LiteratureSearch {
    pub fn new(registry: SourceRegistry, config: &Config) -> Self {
        Self {
            registry,
            dedup: Deduplicator::new(config.title_threshold()).with_doi_overlap(config.record_doi_overlap),
            profile: config.profile,
            default_max_results: config.max_results,
            source_timeout: config.source_timeout(),
        }
    }

    /// Build every adapter from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(SourceRegistry::from_config(config)?, config))
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn validate(&self, request: &SearchRequest) -> Result<ValidatedRequest> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(LitSearchError::MissingQuery);
        }

        let requested: Vec<SourceId> = match &request.sources {
            None => self.profile.default_sources().to_vec(),
            Some(ids) => ids
                .iter()
                .map(|id| SourceId::from_str(id))
                .collect::<Result<_>>()?,
        };
        let mut sources = Vec::with_capacity(requested.len());
        for id in requested {
            if !sources.contains(&id) {
                sources.push(id);
            }
        }
        if sources.is_empty() {
            return Err(LitSearchError::NoSources);
        }

        let max_results = request.max_results.unwrap_or(self.default_max_results);
        if max_results == 0 {
            return Err(LitSearchError::Validation("max_results must be at least 1".to_string()));
        }

        Ok(ValidatedRequest {
            query: query.to_string(),
            sources,
            max_results,
        })
    }

    /// Run one search.
    ///
    /// Partial source failure still succeeds, with the failures listed in the
    /// response breakdown. Only total failure is an error.
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let request = self.validate(request)?;
        info!(
            query = %request.query,
            sources = ?request.sources,
            max_results = request.max_results,
            "Search started"
        );

        let results = fanout::search_all(
            &self.registry,
            &request.query,
            &request.sources,
            request.max_results,
            self.source_timeout,
        )
        .await;

        if results.iter().all(|r| !r.is_success()) {
            let failures: Vec<(SourceId, String)> = results
                .iter()
                .map(|r| (r.source, r.error.clone().unwrap_or_default()))
                .collect();
            warn!(count = failures.len(), "Every selected source failed");
            return Err(LitSearchError::AllSourcesFailed { failures });
        }

        let outcome = self.dedup.deduplicate(&results);
        let response = assemble(&request.query, &request.sources, &results, outcome);
        info!(
            unique = response.total_unique,
            found = response.total_found,
            coverage = %response.coverage_summary(),
            "Search complete"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{paper, ScriptedAdapter};
    use std::sync::Arc;

    fn search_with(adapters: Vec<ScriptedAdapter>, config: &Config) -> LiteratureSearch {
        let mut registry = SourceRegistry::new();
        for adapter in adapters {
            registry.register(Arc::new(adapter));
        }
        LiteratureSearch::new(registry, config)
    }

    #[tokio::test]
    async fn test_partial_failure_still_succeeds() {
        let search = search_with(
            vec![
                ScriptedAdapter::ok(
                    SourceId::Pubmed,
                    vec![
                        paper(SourceId::Pubmed, "Metformin and longevity", Some("10.1/m")),
                        paper(SourceId::Pubmed, "SGLT2 inhibitors in heart failure", None),
                    ],
                ),
                ScriptedAdapter::failing(SourceId::OpenAlex, "HTTP 500"),
                ScriptedAdapter::ok(
                    SourceId::EuropePmc,
                    vec![paper(SourceId::EuropePmc, "Metformin and longevity", Some("10.1/M"))],
                ),
            ],
            &Config::default(),
        );
        let request = SearchRequest::new("metformin").with_sources(&[
            SourceId::Pubmed,
            SourceId::OpenAlex,
            SourceId::EuropePmc,
        ]);

        let response = search.run(&request).await.expect("partial success");
        assert_eq!(response.total_found, 3);
        assert_eq!(response.total_unique, 2);
        assert_eq!(response.failed_sources().len(), 1);
        assert_eq!(response.per_source_breakdown[1].source, SourceId::OpenAlex);
    }

    #[tokio::test]
    async fn test_all_sources_failed_keeps_breakdown() {
        let search = search_with(
            vec![
                ScriptedAdapter::failing(SourceId::Crossref, "timeout"),
                ScriptedAdapter::failing(SourceId::Core, "bad key"),
            ],
            &Config::default(),
        );
        let request = SearchRequest::new("q").with_sources(&[SourceId::Crossref, SourceId::Core]);

        match search.run(&request).await {
            Err(LitSearchError::AllSourcesFailed { failures }) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].0, SourceId::Crossref);
                assert!(failures[1].1.contains("bad key"));
            }
            other => panic!("expected AllSourcesFailed, got {:?}", other.map(|r| r.total_unique)),
        }
    }

    #[test]
    fn test_validation_errors() {
        let search = search_with(Vec::new(), &Config::default());

        let blank = SearchRequest::new("   ");
        assert!(matches!(search.validate(&blank), Err(LitSearchError::MissingQuery)));

        let no_sources = SearchRequest {
            sources: Some(Vec::new()),
            ..SearchRequest::new("q")
        };
        assert!(matches!(search.validate(&no_sources), Err(LitSearchError::NoSources)));

        let zero = SearchRequest::new("q").with_max_results(0);
        assert!(matches!(search.validate(&zero), Err(LitSearchError::Validation(_))));

        let unknown = SearchRequest {
            sources: Some(vec!["scopus".to_string()]),
            ..SearchRequest::new("q")
        };
        assert!(matches!(search.validate(&unknown), Err(LitSearchError::Validation(_))));
    }

    #[test]
    fn test_defaults_and_distinct_sources() {
        let config = Config {
            profile: Profile::Business,
            max_results: 25,
            ..Config::default()
        };
        let search = search_with(Vec::new(), &config);

        let validated = search.validate(&SearchRequest::new(" open innovation ")).expect("valid");
        assert_eq!(validated.query, "open innovation");
        assert_eq!(validated.sources, Profile::Business.default_sources().to_vec());
        assert_eq!(validated.max_results, 25);

        let repeated = SearchRequest {
            sources: Some(vec!["ssrn".into(), "crossref".into(), "SSRN".into()]),
            ..SearchRequest::new("q")
        };
        let validated = search.validate(&repeated).expect("valid");
        assert_eq!(validated.sources, vec![SourceId::Ssrn, SourceId::Crossref]);
    }

    #[test]
    fn test_request_json() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "statins", "maxResults": 50}"#).expect("parse");
        assert_eq!(request.query, "statins");
        assert!(request.sources.is_none());
        assert_eq!(request.max_results, Some(50));
    }
}
