//! Europe PMC adapter.
//!
//! `resultType=core` returns abstracts, full author lists and journal details in
//! a single call. The same index carries preprints (`SRC:PPR`), which is how the
//! medRxiv and bioRxiv adapters are served.

use super::{build_client, fetch_json, strip_markup, SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::{clean_doi, non_empty, parse_year, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Europe PMC REST base URL
const EUROPE_PMC_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

/// Maximum `pageSize` Europe PMC accepts
const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResponse {
    #[serde(default)]
    hit_count: u64,
    result_list: Option<EpmcResultList>,
}

#[derive(Debug, Deserialize)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<EpmcResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResult {
    id: Option<String>,
    source: Option<String>,
    pmid: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    author_string: Option<String>,
    author_list: Option<EpmcAuthorList>,
    journal_info: Option<EpmcJournalInfo>,
    book_or_report_details: Option<EpmcReportDetails>,
    pub_year: Option<String>,
    abstract_text: Option<String>,
    cited_by_count: Option<u64>,
    pub_type_list: Option<EpmcPubTypeList>,
}

#[derive(Debug, Deserialize)]
struct EpmcAuthorList {
    #[serde(default)]
    author: Vec<EpmcAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcAuthor {
    full_name: Option<String>,
    author_id: Option<EpmcAuthorId>,
    author_affiliation_details_list: Option<EpmcAffiliations>,
}

#[derive(Debug, Deserialize)]
struct EpmcAuthorId {
    #[serde(rename = "type")]
    id_type: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcAffiliations {
    #[serde(default)]
    author_affiliation: Vec<EpmcAffiliation>,
}

#[derive(Debug, Deserialize)]
struct EpmcAffiliation {
    affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpmcJournalInfo {
    journal: Option<EpmcJournal>,
}

#[derive(Debug, Deserialize)]
struct EpmcJournal {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpmcReportDetails {
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcPubTypeList {
    #[serde(default)]
    pub_type: Vec<String>,
}

/// Europe PMC search, optionally narrowed by an extra query clause.
pub struct EuropePmcAdapter {
    client: reqwest::Client,
    base_url: String,
    source: SourceId,
    restriction: Option<String>,
}

impl EuropePmcAdapter {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| EUROPE_PMC_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            source: SourceId::EuropePmc,
            restriction: None,
        })
    }

    /// AND `clause` onto every query and report results under `source`.
    pub fn restricted(mut self, source: SourceId, clause: impl Into<String>) -> Self {
        self.source = source;
        self.restriction = Some(clause.into());
        self
    }

    fn effective_query(&self, query: &str) -> String {
        match &self.restriction {
            Some(clause) => format!("({}) AND {}", query, clause),
            None => query.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for EuropePmcAdapter {
    fn id(&self) -> SourceId {
        self.source
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let page_size = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let full_query = self.effective_query(query);
        info!(source = %self.source, query = %full_query, page_size = %page_size, "Starting Europe PMC query");

        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("query", full_query.as_str()),
                ("resultType", "core"),
                ("format", "json"),
                ("pageSize", page_size.as_str()),
            ]);
        let response: EpmcResponse = fetch_json(request, self.source).await?;

        let papers = response
            .result_list
            .map(|list| {
                list.result
                    .into_iter()
                    .map(|r| epmc_to_paper(r, self.source))
                    .collect()
            })
            .unwrap_or_default();
        Ok(SourceBatch::new(papers, response.hit_count))
    }
}

fn epmc_to_paper(r: EpmcResult, source: SourceId) -> Paper {
    let mut paper = Paper::new(source, title_or_sentinel(r.title.map(|t| strip_markup(&t))));

    paper.doi = r.doi.as_deref().and_then(clean_doi);
    paper.pmid = non_empty(r.pmid);
    paper.year = r.pub_year.as_deref().and_then(parse_year);
    paper.citation_count = r.cited_by_count;
    paper.abstract_text = r
        .abstract_text
        .map(|a| strip_markup(&a))
        .filter(|a| !a.is_empty());
    paper.journal = r
        .journal_info
        .and_then(|info| info.journal)
        .and_then(|journal| non_empty(journal.title))
        .or_else(|| r.book_or_report_details.and_then(|d| non_empty(d.publisher)));
    paper.publication_type = r
        .pub_type_list
        .and_then(|list| list.pub_type.into_iter().next());

    let id = non_empty(r.id);
    let record_source = non_empty(r.source);
    paper.url = match (&paper.pmid, &record_source, &id) {
        (Some(pmid), _, _) => Some(format!("https://europepmc.org/article/MED/{}", pmid)),
        (None, Some(src), Some(id)) => Some(format!("https://europepmc.org/article/{}/{}", src, id)),
        _ => paper.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi)),
    };
    paper.external_id = id;

    let structured: Vec<Author> = r
        .author_list
        .map(|list| {
            list.author
                .into_iter()
                .filter_map(|a| {
                    let name = non_empty(a.full_name)?;
                    let orcid = a
                        .author_id
                        .filter(|id| id.id_type.as_deref() == Some("ORCID"))
                        .and_then(|id| non_empty(id.value));
                    let affiliation = a
                        .author_affiliation_details_list
                        .and_then(|list| list.author_affiliation.into_iter().find_map(|aff| non_empty(aff.affiliation)));
                    Some(Author {
                        name,
                        affiliation,
                        orcid,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    paper.authors = if structured.is_empty() {
        r.author_string
            .map(|s| {
                s.trim_end_matches('.')
                    .split(", ")
                    .filter_map(|name| non_empty(Some(name.to_string())))
                    .map(Author::new)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        structured
    };

    paper
}
