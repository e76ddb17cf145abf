//! OpenAlex adapter.
//!
//! API notes:
//! - `mailto` puts requests in the polite pool (10 req/s vs 1 req/s)
//! - `per-page` tops out at 200, larger requests are split into pages
//! - abstracts ship as an inverted index and are rebuilt locally

use super::{build_client, fetch_json, SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::{clean_doi, non_empty, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OpenAlex API base URL
const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Maximum results per page (OpenAlex limit)
const MAX_PER_PAGE: usize = 200;

/// Pages fetched in parallel
const CONCURRENT_PAGES: usize = 5;

/// Fields requested from `/works`
const SELECT_FIELDS: &str = "id,title,display_name,publication_year,doi,cited_by_count,abstract_inverted_index,authorships,primary_location,best_oa_location,type,ids";

#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    meta: OpenAlexMeta,
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexMeta {
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    id: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    cited_by_count: Option<u64>,
    #[serde(rename = "abstract_inverted_index")]
    abstract_index: Option<serde_json::Value>,
    authorships: Option<Vec<OpenAlexAuthorship>>,
    primary_location: Option<OpenAlexLocation>,
    best_oa_location: Option<OpenAlexLocation>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    ids: Option<OpenAlexIds>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthor>,
    #[serde(default)]
    institutions: Vec<OpenAlexInstitution>,
    #[serde(default)]
    raw_affiliation_strings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
    orcid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexInstitution {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    source: Option<OpenAlexSource>,
    landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexIds {
    pmid: Option<String>,
}

/// OpenAlex `/works` search.
pub struct OpenAlexAdapter {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexAdapter {
    pub fn new(base_url: Option<String>, mailto: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| OPENALEX_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            mailto,
        })
    }

    async fn fetch_page(&self, query: &str, page: usize, per_page: usize) -> Result<OpenAlexResponse> {
        let url = build_search_url(&self.base_url, query, page, per_page, self.mailto.as_deref());
        debug!(url = %url, page, "Fetching OpenAlex page");
        fetch_json(self.client.get(&url), SourceId::OpenAlex).await
    }
}

#[async_trait]
impl SourceAdapter for OpenAlexAdapter {
    fn id(&self) -> SourceId {
        SourceId::OpenAlex
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let per_page = max_results.clamp(1, MAX_PER_PAGE);
        let page_count = max_results.div_ceil(per_page).max(1);

        info!(query, pages = page_count, per_page, "Starting OpenAlex query");

        let mut pages: Vec<(usize, Result<OpenAlexResponse>)> = stream::iter(1..=page_count)
            .map(|page| async move { (page, self.fetch_page(query, page, per_page).await) })
            .buffer_unordered(CONCURRENT_PAGES)
            .collect()
            .await;
        pages.sort_by_key(|(page, _)| *page);

        // Any failed page fails the source
        let mut papers = Vec::new();
        let mut total = 0;
        for (page, outcome) in pages {
            let response = outcome.inspect_err(|e| {
                warn!(page, error = %e, "Failed to fetch OpenAlex page");
            })?;
            total = total.max(response.meta.count.unwrap_or(0));
            papers.extend(response.results.into_iter().map(work_to_paper));
        }

        Ok(SourceBatch::new(papers, total))
    }
}

/// Build OpenAlex API search URL
fn build_search_url(base: &str, query: &str, page: usize, per_page: usize, mailto: Option<&str>) -> String {
    let mut url = format!(
        "{}/works?search={}&per-page={}&page={}&select={}",
        base,
        urlencoding::encode(query),
        per_page,
        page,
        SELECT_FIELDS
    );
    if let Some(email) = mailto {
        url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
    }
    url
}

fn work_to_paper(work: OpenAlexWork) -> Paper {
    let mut paper = Paper::new(
        SourceId::OpenAlex,
        title_or_sentinel(work.display_name.or(work.title)),
    );

    paper.external_id = non_empty(work.id);
    paper.year = work.publication_year;
    paper.doi = work.doi.as_deref().and_then(clean_doi);
    paper.citation_count = work.cited_by_count;
    paper.publication_type = non_empty(work.work_type);
    paper.pmid = work
        .ids
        .and_then(|ids| ids.pmid)
        .map(|pmid| pmid.trim_start_matches("https://pubmed.ncbi.nlm.nih.gov/").to_string())
        .and_then(|pmid| non_empty(Some(pmid)));

    paper.authors = work
        .authorships
        .unwrap_or_default()
        .into_iter()
        .filter_map(|authorship| {
            let author = authorship.author?;
            let name = non_empty(author.display_name)?;
            let affiliation = authorship
                .institutions
                .into_iter()
                .find_map(|i| non_empty(i.display_name))
                .or_else(|| authorship.raw_affiliation_strings.into_iter().find_map(|a| non_empty(Some(a))));
            Some(Author {
                name,
                affiliation,
                orcid: non_empty(author.orcid),
            })
        })
        .collect();

    if let Some(location) = &work.primary_location {
        paper.journal = location
            .source
            .as_ref()
            .and_then(|s| non_empty(s.display_name.clone()));
        paper.url = non_empty(location.landing_page_url.clone());
    }
    if paper.url.is_none() {
        paper.url = work
            .best_oa_location
            .and_then(|l| non_empty(l.landing_page_url))
            .or_else(|| paper.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi)));
    }

    paper.abstract_text = work
        .abstract_index
        .as_ref()
        .map(reconstruct_abstract)
        .filter(|a| !a.is_empty());

    paper
}

/// Rebuild plaintext from an OpenAlex `abstract_inverted_index`.
///
/// Every `(word, position)` pair is collected, stable-sorted by position and
/// joined with single spaces.
pub fn reconstruct_abstract(inverted_index: &serde_json::Value) -> String {
    let Some(obj) = inverted_index.as_object() else {
        return String::new();
    };

    let mut words: Vec<(i64, &str)> = Vec::new();
    for (word, positions) in obj {
        if let Some(pos_array) = positions.as_array() {
            for pos in pos_array {
                if let Some(p) = pos.as_i64() {
                    words.push((p, word.as_str()));
                }
            }
        }
    }

    words.sort_by_key(|(pos, _)| *pos);
    words.iter().map(|(_, w)| *w).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_reconstruct_abstract() {
        let index = json!({"the": [0, 4], "cat": [1], "sat": [2], "mat": [3]});
        assert_eq!(reconstruct_abstract(&index), "the cat sat mat the");
    }

    #[test]
    fn test_reconstruct_abstract_not_an_object() {
        assert_eq!(reconstruct_abstract(&json!(null)), "");
        assert_eq!(reconstruct_abstract(&json!({})), "");
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url(OPENALEX_API_BASE, "machine learning", 1, 200, Some("me@x.org"));
        assert!(url.contains("search=machine%20learning"));
        assert!(url.contains("per-page=200"));
        assert!(url.contains("mailto=me%40x.org"));

        let anonymous = build_search_url(OPENALEX_API_BASE, "q", 2, 50, None);
        assert!(anonymous.contains("page=2"));
        assert!(!anonymous.contains("mailto"));
    }

    #[tokio::test]
    async fn test_fetch_maps_works() {
        let mut server = Server::new_async().await;
        let body = json!({
            "meta": {"count": 1234},
            "results": [{
                "id": "https://openalex.org/W1",
                "display_name": "Effects of Metformin on Type 2 Diabetes",
                "publication_year": 2020,
                "doi": "https://doi.org/10.1000/XYZ",
                "cited_by_count": 17,
                "abstract_inverted_index": {"Metformin": [0], "works": [1]},
                "authorships": [{
                    "author": {"display_name": "Ada Lovelace", "orcid": "https://orcid.org/0000-0001"},
                    "institutions": [{"display_name": "Analytical Engine Institute"}]
                }],
                "primary_location": {
                    "source": {"display_name": "Diabetes Care"},
                    "landing_page_url": "https://example.org/w1"
                },
                "type": "article",
                "ids": {"pmid": "https://pubmed.ncbi.nlm.nih.gov/555"}
            }, {
                "id": "https://openalex.org/W2",
                "title": null
            }]
        });
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("search".into(), "metformin".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let adapter = OpenAlexAdapter::new(Some(server.url()), None, Duration::from_secs(5))
            .expect("adapter");
        let batch = adapter.fetch("metformin", 25).await.expect("fetch");

        assert_eq!(batch.total_available, 1234);
        assert_eq!(batch.papers.len(), 2);

        let first = &batch.papers[0];
        assert_eq!(first.doi.as_deref(), Some("10.1000/XYZ"));
        assert_eq!(first.pmid.as_deref(), Some("555"));
        assert_eq!(first.journal.as_deref(), Some("Diabetes Care"));
        assert_eq!(first.abstract_text.as_deref(), Some("Metformin works"));
        assert_eq!(first.authors[0].affiliation.as_deref(), Some("Analytical Engine Institute"));
        assert_eq!(first.citation_count, Some(17));

        let second = &batch.papers[1];
        assert_eq!(second.title, crate::paper::NO_TITLE);
        assert!(second.abstract_text.is_none());
        assert!(second.doi.is_none());
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_errors() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let adapter = OpenAlexAdapter::new(Some(server.url()), None, Duration::from_secs(5))
            .expect("adapter");
        let result = adapter.search("anything", 10).await;
        assert!(result.papers.is_empty());
        assert!(result.error.expect("error").contains("500"));
    }

    #[tokio::test]
    async fn test_failed_later_page_fails_source() {
        let mut server = Server::new_async().await;
        let results: Vec<_> = (0..MAX_PER_PAGE)
            .map(|i| json!({"id": format!("https://openalex.org/W{}", i), "display_name": format!("Work {}", i)}))
            .collect();
        let _first = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"meta": {"count": 900}, "results": results}).to_string())
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(500)
            .create_async()
            .await;

        let adapter = OpenAlexAdapter::new(Some(server.url()), None, Duration::from_secs(5))
            .expect("adapter");
        let result = adapter.search("q", 400).await;

        assert!(!result.is_success());
        assert!(result.papers.is_empty());
        assert!(result.error.expect("error").contains("500"));
    }
}
