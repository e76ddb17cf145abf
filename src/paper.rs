//! Canonical paper model shared by every source adapter.
//!
//! Each adapter maps its own response schema into [`Paper`]; the rest of the
//! crate (dedup, assembly, export) only ever sees this shape.

use crate::error::{LitSearchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when a source omits one
pub const NO_TITLE: &str = "No title";

/// Identifier of an external bibliographic database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Pubmed,
    #[serde(rename = "openalex")]
    OpenAlex,
    SemanticScholar,
    EuropePmc,
    Medrxiv,
    Biorxiv,
    Crossref,
    Core,
    GoogleScholar,
    Ssrn,
}

impl SourceId {
    /// Every known source, in display order
    pub const ALL: [SourceId; 10] = [
        SourceId::Pubmed,
        SourceId::OpenAlex,
        SourceId::SemanticScholar,
        SourceId::EuropePmc,
        SourceId::Medrxiv,
        SourceId::Biorxiv,
        SourceId::Crossref,
        SourceId::Core,
        SourceId::GoogleScholar,
        SourceId::Ssrn,
    ];

    /// Stable wire id (`"semantic_scholar"`, `"openalex"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Pubmed => "pubmed",
            SourceId::OpenAlex => "openalex",
            SourceId::SemanticScholar => "semantic_scholar",
            SourceId::EuropePmc => "europe_pmc",
            SourceId::Medrxiv => "medrxiv",
            SourceId::Biorxiv => "biorxiv",
            SourceId::Crossref => "crossref",
            SourceId::Core => "core",
            SourceId::GoogleScholar => "google_scholar",
            SourceId::Ssrn => "ssrn",
        }
    }

    /// Human readable database name
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::Pubmed => "PubMed",
            SourceId::OpenAlex => "OpenAlex",
            SourceId::SemanticScholar => "Semantic Scholar",
            SourceId::EuropePmc => "Europe PMC",
            SourceId::Medrxiv => "medRxiv",
            SourceId::Biorxiv => "bioRxiv",
            SourceId::Crossref => "Crossref",
            SourceId::Core => "CORE",
            SourceId::GoogleScholar => "Google Scholar",
            SourceId::Ssrn => "SSRN",
        }
    }

    /// Parse a comma-separated list such as `"pubmed, openalex"`.
    pub fn parse_list(list: &str) -> Result<Vec<SourceId>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SourceId::from_str)
            .collect()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = LitSearchError;

    fn from_str(s: &str) -> Result<Self> {
        let id = match s.trim().to_ascii_lowercase().as_str() {
            "pubmed" => SourceId::Pubmed,
            "openalex" => SourceId::OpenAlex,
            "semantic_scholar" | "semanticscholar" => SourceId::SemanticScholar,
            "europe_pmc" | "europepmc" => SourceId::EuropePmc,
            "medrxiv" => SourceId::Medrxiv,
            "biorxiv" => SourceId::Biorxiv,
            "crossref" => SourceId::Crossref,
            "core" => SourceId::Core,
            "google_scholar" | "gscholar" => SourceId::GoogleScholar,
            "ssrn" => SourceId::Ssrn,
            other => {
                return Err(LitSearchError::Validation(format!(
                    "unknown source '{}'",
                    other
                )))
            }
        };
        Ok(id)
    }
}

/// Deployment flavour. Decides the default source set and title threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Health and life-science reviews
    #[default]
    General,
    /// Business and management literature
    Business,
}

impl Profile {
    /// Sources searched when the caller does not pick any
    pub fn default_sources(&self) -> &'static [SourceId] {
        match self {
            Profile::General => &[
                SourceId::Pubmed,
                SourceId::OpenAlex,
                SourceId::SemanticScholar,
                SourceId::EuropePmc,
                SourceId::Medrxiv,
                SourceId::Biorxiv,
            ],
            Profile::Business => &[
                SourceId::OpenAlex,
                SourceId::Crossref,
                SourceId::SemanticScholar,
                SourceId::Core,
                SourceId::GoogleScholar,
                SourceId::Ssrn,
            ],
        }
    }

    /// Default Jaccard threshold for fuzzy title matching
    pub fn title_threshold(&self) -> f64 {
        match self {
            Profile::General => 0.9,
            Profile::Business => 0.85,
        }
    }
}

impl FromStr for Profile {
    type Err = LitSearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Profile::General),
            "business" => Ok(Profile::Business),
            other => Err(LitSearchError::Validation(format!(
                "unknown profile '{}'",
                other
            ))),
        }
    }
}

/// One author, in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
            orcid: None,
        }
    }
}

/// Canonical record for one bibliographic item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub title: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    /// Source-specific identifier (OpenAlex work id, S2 paper id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
}

impl Paper {
    /// New paper with only a title. A blank title becomes [`NO_TITLE`].
    pub fn new(source: SourceId, title: impl Into<String>) -> Self {
        Self {
            title: title_or_sentinel(Some(title.into())),
            abstract_text: None,
            authors: Vec::new(),
            doi: None,
            pmid: None,
            external_id: None,
            source,
            journal: None,
            year: None,
            url: None,
            citation_count: None,
            publication_type: None,
        }
    }

    /// Author names in order
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Trimmed title, or the sentinel when missing or blank.
pub fn title_or_sentinel(title: Option<String>) -> String {
    title
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// Drop empty strings so absent metadata stays `None`.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Best-effort year from free text such as `"2021 Mar 4"` or `"2019-05-01"`.
pub fn parse_year(text: &str) -> Option<i32> {
    let digits: Vec<char> = text.chars().collect();
    digits
        .windows(4)
        .enumerate()
        .find(|(idx, w)| {
            w.iter().all(|c| c.is_ascii_digit())
                && (*idx == 0 || !digits[idx - 1].is_ascii_digit())
                && digits.get(idx + 4).map_or(true, |c| !c.is_ascii_digit())
        })
        .and_then(|(_, w)| w.iter().collect::<String>().parse().ok())
}

/// Strip resolver prefixes (`https://doi.org/`, `doi:`) from a DOI.
pub fn clean_doi(doi: &str) -> Option<String> {
    let trimmed = doi.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stripped = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| &trimmed[prefix.len()..])
        .unwrap_or(trimmed)
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Per-adapter envelope returned to the fan-out coordinator.
///
/// A failed adapter always carries empty `papers` and a zero total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source: SourceId,
    pub papers: Vec<Paper>,
    pub total_available: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    pub fn success(source: SourceId, papers: Vec<Paper>, total_available: u64, elapsed_ms: u64) -> Self {
        Self {
            source,
            papers,
            total_available,
            elapsed_ms,
            error: None,
        }
    }

    pub fn failure(source: SourceId, elapsed_ms: u64, error: impl Into<String>) -> Self {
        Self {
            source,
            papers: Vec::new(),
            total_available: 0,
            elapsed_ms,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
