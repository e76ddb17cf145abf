//! CORE (core.ac.uk) adapter.
//!
//! API v3 requires a bearer key. Without one the adapter fails with a config
//! error instead of sending an anonymous request that would be rejected.

use super::{build_client, fetch_json, strip_markup, SourceAdapter, SourceBatch};
use crate::error::{LitSearchError, Result};
use crate::paper::{clean_doi, non_empty, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

const CORE_API_BASE: &str = "https://api.core.ac.uk/v3";

/// Maximum `limit` for `/search/works`
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreSearchResponse {
    #[serde(default)]
    total_hits: u64,
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreWork {
    id: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<CoreAuthor>,
    doi: Option<String>,
    year_published: Option<i32>,
    #[serde(default)]
    journals: Vec<CoreJournal>,
    publisher: Option<String>,
    download_url: Option<String>,
    citation_count: Option<u64>,
    document_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreJournal {
    title: Option<String>,
}

pub struct CoreAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoreAdapter {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| CORE_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_empty(api_key),
        })
    }
}

#[async_trait]
impl SourceAdapter for CoreAdapter {
    fn id(&self) -> SourceId {
        SourceId::Core
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LitSearchError::Config("CORE API key not configured".to_string()))?;
        let limit = max_results.clamp(1, MAX_LIMIT).to_string();
        info!(query, limit = %limit, "Starting CORE query");

        let request = self
            .client
            .get(format!("{}/search/works", self.base_url))
            .bearer_auth(key)
            .query(&[("q", query), ("limit", limit.as_str())]);
        let response: CoreSearchResponse = fetch_json(request, SourceId::Core).await?;

        let papers = response.results.into_iter().map(core_to_paper).collect();
        Ok(SourceBatch::new(papers, response.total_hits))
    }
}

fn core_to_paper(work: CoreWork) -> Paper {
    let mut paper = Paper::new(SourceId::Core, title_or_sentinel(work.title));

    paper.external_id = work.id.map(|id| match id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });
    paper.doi = work.doi.as_deref().and_then(clean_doi);
    paper.abstract_text = work
        .abstract_text
        .map(|a| strip_markup(&a))
        .filter(|a| !a.is_empty());
    paper.year = work.year_published;
    paper.citation_count = work.citation_count;
    paper.publication_type = non_empty(work.document_type);
    paper.journal = work
        .journals
        .into_iter()
        .find_map(|j| non_empty(j.title))
        .or_else(|| non_empty(work.publisher));
    paper.url = non_empty(work.download_url).or_else(|| {
        paper
            .external_id
            .as_ref()
            .map(|id| format!("https://core.ac.uk/works/{}", id))
    });
    paper.authors = work
        .authors
        .into_iter()
        .filter_map(|a| non_empty(a.name).map(Author::new))
        .collect();
    paper
}
