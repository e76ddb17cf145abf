//! CSV export, one row per paper.
//!
//! Quoting follows the `csv` crate's necessary style: a field is quoted only
//! when it contains a comma, quote, CR or LF, and inner quotes are doubled.

use crate::error::{LitSearchError, Result};
use crate::paper::{Author, Paper, SourceId};
use serde::{Deserialize, Serialize};

pub const HEADER: [&str; 10] = [
    "title",
    "abstract",
    "authors",
    "journal",
    "year",
    "doi",
    "pmid",
    "url",
    "source",
    "citation_count",
];

/// Separator between author names in the `authors` column
pub const AUTHOR_SEPARATOR: &str = "; ";

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    title: String,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    authors: Option<String>,
    journal: Option<String>,
    year: Option<i32>,
    doi: Option<String>,
    pmid: Option<String>,
    url: Option<String>,
    source: SourceId,
    citation_count: Option<u64>,
}

impl From<&Paper> for CsvRow {
    fn from(paper: &Paper) -> Self {
        let authors = paper.author_names().join(AUTHOR_SEPARATOR);
        Self {
            title: paper.title.clone(),
            abstract_text: paper.abstract_text.clone(),
            authors: (!authors.is_empty()).then_some(authors),
            journal: paper.journal.clone(),
            year: paper.year,
            doi: paper.doi.clone(),
            pmid: paper.pmid.clone(),
            url: paper.url.clone(),
            source: paper.source,
            citation_count: paper.citation_count,
        }
    }
}

impl From<CsvRow> for Paper {
    fn from(row: CsvRow) -> Self {
        let mut paper = Paper::new(row.source, row.title);
        paper.abstract_text = row.abstract_text;
        paper.authors = row
            .authors
            .map(|a| {
                a.split(AUTHOR_SEPARATOR.trim())
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(Author::new)
                    .collect()
            })
            .unwrap_or_default();
        paper.journal = row.journal;
        paper.year = row.year;
        paper.doi = row.doi;
        paper.pmid = row.pmid;
        paper.url = row.url;
        paper.citation_count = row.citation_count;
        paper
    }
}

/// Render papers as CSV with a header row, even when `papers` is empty.
pub fn to_csv(papers: &[Paper]) -> Result<String> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(HEADER)?;
    for paper in papers {
        wtr.serialize(CsvRow::from(paper))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| LitSearchError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| LitSearchError::Parse(format!("CSV output is not UTF-8: {}", e)))
}

/// Read papers back from a [`to_csv`] export. Affiliations and ORCIDs are not
/// part of the CSV and come back empty.
pub fn from_csv(input: &str) -> Result<Vec<Paper>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    rdr.deserialize::<CsvRow>()
        .map(|row| row.map(Paper::from).map_err(LitSearchError::from))
        .collect()
}
