//! Crossref adapter.
//!
//! Uses the `/works` query endpoint. Crossref abstracts are JATS XML fragments
//! and are stripped to plain text.

use super::{build_client, fetch_json, strip_markup, SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::{clean_doi, non_empty, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Crossref API base URL
const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Maximum `rows` Crossref accepts per request
const MAX_ROWS: usize = 1000;

/// Fields requested from `/works`
const SELECT_FIELDS: &str = "DOI,title,author,container-title,published,issued,abstract,URL,is-referenced-by-count,type";

/// Crossref `/works` search, optionally restricted by a filter expression.
pub struct CrossrefAdapter {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    filter: Option<String>,
    source: SourceId,
}

impl CrossrefAdapter {
    pub fn new(base_url: Option<String>, mailto: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| CROSSREF_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            mailto,
            filter: None,
            source: SourceId::Crossref,
        })
    }

    /// Restrict results with a Crossref filter (e.g. `prefix:10.2139`) and
    /// report them under `source`.
    pub fn restricted(mut self, source: SourceId, filter: impl Into<String>) -> Self {
        self.source = source;
        self.filter = Some(filter.into());
        self
    }
}

#[async_trait]
impl SourceAdapter for CrossrefAdapter {
    fn id(&self) -> SourceId {
        self.source
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let rows = max_results.clamp(1, MAX_ROWS).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("query", query),
            ("rows", rows.as_str()),
            ("select", SELECT_FIELDS),
        ];
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.as_str()));
        }
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.as_str()));
        }

        info!(source = %self.source, query, rows = %rows, "Starting Crossref query");

        let request = self
            .client
            .get(format!("{}/works", self.base_url))
            .query(&params);
        let response: CrossrefResponse = fetch_json(request, self.source).await?;

        let papers = response
            .message
            .items
            .into_iter()
            .map(|item| item_to_paper(item, self.source))
            .collect();
        Ok(SourceBatch::new(papers, response.message.total_results))
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(rename = "total-results", default)]
    total_results: u64,
    #[serde(default)]
    items: Vec<CrossrefItem>,
}

#[derive(Debug, Deserialize)]
struct CrossrefItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    published: Option<CrossrefDate>,
    issued: Option<CrossrefDate>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "is-referenced-by-count")]
    cited_by: Option<u64>,
    #[serde(rename = "type")]
    work_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
    #[serde(rename = "ORCID")]
    orcid: Option<String>,
    #[serde(default)]
    affiliation: Vec<CrossrefAffiliation>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAffiliation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|parts| parts.first().copied().flatten())
    }
}

/// Parse Crossref API item into a paper
fn item_to_paper(item: CrossrefItem, source: SourceId) -> Paper {
    let mut paper = Paper::new(source, title_or_sentinel(item.title.into_iter().next()));

    paper.doi = item.doi.as_deref().and_then(clean_doi);
    paper.journal = non_empty(item.container_title.into_iter().next());
    paper.year = item
        .published
        .as_ref()
        .and_then(CrossrefDate::year)
        .or_else(|| item.issued.as_ref().and_then(CrossrefDate::year));
    paper.abstract_text = item
        .abstract_text
        .map(|s| strip_markup(&s))
        .filter(|s| !s.is_empty());
    paper.url = non_empty(item.url);
    paper.citation_count = item.cited_by;
    paper.publication_type = non_empty(item.work_type);
    paper.external_id = paper.doi.clone();

    paper.authors = item
        .author
        .into_iter()
        .filter_map(|a| {
            let full = format!(
                "{} {}",
                a.given.unwrap_or_default(),
                a.family.unwrap_or_default()
            );
            let name = non_empty(Some(full)).or_else(|| non_empty(a.name))?;
            Some(Author {
                name,
                affiliation: a.affiliation.into_iter().find_map(|aff| non_empty(aff.name)),
                orcid: non_empty(a.orcid),
            })
        })
        .collect();

    paper
}
