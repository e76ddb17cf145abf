//! Semantic Scholar adapter.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - Max 100 papers per request
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use super::{build_client, fetch_json, SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::{clean_doi, non_empty, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Semantic Scholar API base URL
const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Maximum `limit` for the search endpoint
const MAX_LIMIT: usize = 100;

/// Fields requested for every paper
const FIELDS: &str = "paperId,title,abstract,year,externalIds,citationCount,url,venue,journal,authors,publicationTypes";

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    data: Vec<SSPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SSPaper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    external_ids: Option<SSExternalIds>,
    citation_count: Option<u64>,
    url: Option<String>,
    venue: Option<String>,
    journal: Option<SSJournal>,
    #[serde(default)]
    authors: Vec<SSAuthor>,
    publication_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSJournal {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

/// Semantic Scholar relevance search.
pub struct SemanticScholarAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| SS_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn id(&self) -> SourceId {
        SourceId::SemanticScholar
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let limit = max_results.clamp(1, MAX_LIMIT).to_string();
        info!(query, limit = %limit, "Starting Semantic Scholar query");

        let mut request = self
            .client
            .get(format!("{}/paper/search", self.base_url))
            .query(&[("query", query), ("limit", limit.as_str()), ("fields", FIELDS)]);

        // Add API key header if provided
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response: SSSearchResponse = fetch_json(request, SourceId::SemanticScholar).await?;
        let papers = response.data.into_iter().map(ss_to_paper).collect();
        Ok(SourceBatch::new(papers, response.total))
    }
}

fn ss_to_paper(p: SSPaper) -> Paper {
    let mut paper = Paper::new(SourceId::SemanticScholar, title_or_sentinel(p.title));
    let (doi, pmid) = p
        .external_ids
        .map(|ids| (ids.doi, ids.pubmed))
        .unwrap_or((None, None));

    paper.external_id = non_empty(p.paper_id);
    paper.doi = doi.as_deref().and_then(clean_doi);
    paper.pmid = non_empty(pmid);
    paper.abstract_text = non_empty(p.abstract_text);
    paper.year = p.year;
    paper.citation_count = p.citation_count;
    paper.url = non_empty(p.url);
    paper.journal = p
        .journal
        .and_then(|j| non_empty(j.name))
        .or_else(|| non_empty(p.venue));
    paper.publication_type = p.publication_types.and_then(|types| types.into_iter().next());
    paper.authors = p
        .authors
        .into_iter()
        .filter_map(|a| non_empty(a.name).map(Author::new))
        .collect();
    paper
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_sends_key_and_maps_papers() {
        let mut server = Server::new_async().await;
        let body = json!({
            "total": 42,
            "offset": 0,
            "data": [{
                "paperId": "abc123",
                "title": "Attention Is All You Need",
                "abstract": null,
                "year": 2017,
                "externalIds": {"DOI": "10.48550/arXiv.1706.03762", "PubMed": null},
                "citationCount": 100000,
                "url": "https://www.semanticscholar.org/paper/abc123",
                "venue": "NeurIPS",
                "journal": null,
                "authors": [{"authorId": "1", "name": "Ashish Vaswani"}, {"authorId": "2", "name": null}],
                "publicationTypes": ["JournalArticle", "Conference"]
            }]
        });
        let _m = server
            .mock("GET", "/paper/search")
            .match_header("x-api-key", "secret")
            .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let adapter = SemanticScholarAdapter::new(
            Some(server.url()),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .expect("adapter");
        let batch = adapter.fetch("transformers", 500).await.expect("fetch");

        assert_eq!(batch.total_available, 42);
        let paper = &batch.papers[0];
        assert_eq!(paper.external_id.as_deref(), Some("abc123"));
        assert_eq!(paper.journal.as_deref(), Some("NeurIPS"));
        assert_eq!(paper.publication_type.as_deref(), Some("JournalArticle"));
        assert_eq!(paper.authors.len(), 1);
        assert!(paper.abstract_text.is_none());
        assert!(paper.pmid.is_none());
    }
}
