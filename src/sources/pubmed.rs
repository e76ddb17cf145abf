//! PubMed adapter over NCBI E-utilities.
//!
//! Two-step protocol: `esearch` returns the hit count and PMIDs, `esummary`
//! returns the records. Both steps count toward the adapter's elapsed time.
//! Summaries carry no abstract, so `abstract_text` stays empty for this source.

use super::{build_client, fetch_json, SourceAdapter, SourceBatch};
use crate::error::{LitSearchError, OptionExt, Result};
use crate::paper::{clean_doi, non_empty, parse_year, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// E-utilities base URL
const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// `retmax` ceiling for esearch
const MAX_RETMAX: usize = 10_000;

/// PMIDs per esummary request, keeps the URL well under NCBI's limit
const SUMMARY_CHUNK: usize = 200;

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: String,
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ESummaryResponse {
    result: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PubMedSummary {
    uid: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<PubMedAuthor>,
    fulljournalname: Option<String>,
    source: Option<String>,
    pubdate: Option<String>,
    #[serde(default)]
    articleids: Vec<PubMedArticleId>,
    #[serde(default)]
    pubtype: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubMedAuthor {
    name: Option<String>,
    authtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PubMedArticleId {
    idtype: String,
    value: String,
}

/// PubMed search via esearch + esummary.
pub struct PubMedAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PubMedAdapter {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| EUTILS_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn esearch(&self, query: &str, retmax: usize) -> Result<ESearchResult> {
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", retmax.to_string()),
            ("retmode", "json".to_string()),
        ]);
        let request = self
            .client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params);
        let response: ESearchResponse = fetch_json(request, SourceId::Pubmed).await?;
        Ok(response.esearchresult)
    }

    async fn esummary(&self, pmids: &[String]) -> Result<Vec<Paper>> {
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("retmode", "json".to_string()),
        ]);
        let request = self
            .client
            .get(format!("{}/esummary.fcgi", self.base_url))
            .query(&params);
        let response: ESummaryResponse = fetch_json(request, SourceId::Pubmed).await?;
        parse_summaries(response.result)
    }
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    fn id(&self) -> SourceId {
        SourceId::Pubmed
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let retmax = max_results.clamp(1, MAX_RETMAX);
        info!(query, retmax, "Starting PubMed esearch");

        let search = self.esearch(query, retmax).await?;
        let total = search.count.trim().parse::<u64>().unwrap_or(search.idlist.len() as u64);
        debug!(total, ids = search.idlist.len(), "PubMed esearch complete");

        let mut papers = Vec::with_capacity(search.idlist.len());
        for chunk in search.idlist.chunks(SUMMARY_CHUNK) {
            papers.extend(self.esummary(chunk).await?);
        }

        Ok(SourceBatch::new(papers, total))
    }
}

/// Walk `result.uids` in order and map each summary record.
fn parse_summaries(mut result: serde_json::Map<String, Value>) -> Result<Vec<Paper>> {
    let uids: Vec<String> = result
        .remove("uids")
        .ok_or_parse("esummary response has no uids")
        .and_then(|v| serde_json::from_value::<Vec<String>>(v).map_err(LitSearchError::from))?;

    let mut papers = Vec::with_capacity(uids.len());
    for uid in uids {
        let Some(record) = result.remove(&uid) else {
            continue;
        };
        // Per-record errors (e.g. {"uid": "1", "error": "cannot get document summary"})
        if record.get("error").is_some() {
            debug!(uid = %uid, "Skipping PubMed record with error");
            continue;
        }
        let summary: PubMedSummary = serde_json::from_value(record)?;
        papers.push(summary_to_paper(summary, &uid));
    }
    Ok(papers)
}

fn summary_to_paper(summary: PubMedSummary, uid: &str) -> Paper {
    let mut paper = Paper::new(SourceId::Pubmed, title_or_sentinel(summary.title));
    let pmid = non_empty(summary.uid).unwrap_or_else(|| uid.to_string());

    paper.doi = summary
        .articleids
        .iter()
        .find(|id| id.idtype.eq_ignore_ascii_case("doi"))
        .and_then(|id| clean_doi(&id.value));
    paper.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid));
    paper.external_id = Some(pmid.clone());
    paper.pmid = Some(pmid);
    paper.journal = non_empty(summary.fulljournalname).or_else(|| non_empty(summary.source));
    paper.year = summary.pubdate.as_deref().and_then(parse_year);
    paper.publication_type = summary.pubtype.into_iter().next();
    paper.authors = summary
        .authors
        .into_iter()
        .filter(|a| a.authtype.as_deref().map_or(true, |t| t.eq_ignore_ascii_case("author")))
        .filter_map(|a| non_empty(a.name).map(Author::new))
        .collect();
    paper
}
