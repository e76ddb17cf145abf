//! Bibliographic export of the deduplicated corpus.
//!
//! Every formatter is a pure function of its input: the same papers always
//! render to byte-identical output.

pub mod bibtex;
pub mod csv;
pub mod ris;

use crate::error::{LitSearchError, Result};
use crate::paper::Paper;
#[cfg(test)]
use crate::paper::{Author, SourceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Ris,
    Csv,
    Bibtex,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Ris => "application/x-research-info-systems",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Bibtex => "application/x-bibtex",
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Ris => "ris",
            ExportFormat::Csv => "csv",
            ExportFormat::Bibtex => "bib",
        }
    }

    pub fn render(&self, papers: &[Paper]) -> Result<String> {
        match self {
            ExportFormat::Ris => Ok(ris::to_ris(papers)),
            ExportFormat::Csv => csv::to_csv(papers),
            ExportFormat::Bibtex => Ok(bibtex::to_bibtex(papers)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Ris => "ris",
            ExportFormat::Csv => "csv",
            ExportFormat::Bibtex => "bibtex",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = LitSearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ris" => Ok(ExportFormat::Ris),
            "csv" => Ok(ExportFormat::Csv),
            "bibtex" | "bib" => Ok(ExportFormat::Bibtex),
            other => Err(LitSearchError::Validation(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

/// Two papers exercising quoting, escaping and missing fields
#[cfg(test)]
pub(crate) fn sample_papers() -> Vec<Paper> {
    let mut first = Paper::new(SourceId::Pubmed, "Metformin, aging & \"healthspan\"");
    first.abstract_text = Some("Line one\nline two, with comma".to_string());
    first.authors = vec![Author::new("Barzilai N"), Author::new("Crandall JP")];
    first.journal = Some("Cell Metabolism".to_string());
    first.year = Some(2016);
    first.doi = Some("10.1016/j.cmet.2016.05.011".to_string());
    first.pmid = Some("27304507".to_string());
    first.url = Some("https://pubmed.ncbi.nlm.nih.gov/27304507/".to_string());

    let second = Paper::new(SourceId::OpenAlex, "Untitled preprint notes");
    vec![first, second]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing_and_metadata() {
        assert_eq!("BibTeX".parse::<ExportFormat>().expect("known"), ExportFormat::Bibtex);
        assert_eq!("bib".parse::<ExportFormat>().expect("known"), ExportFormat::Bibtex);
        assert!("endnote".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Ris.mime_type(), "application/x-research-info-systems");
        assert_eq!(ExportFormat::Bibtex.extension(), "bib");
    }

    #[test]
    fn test_render_is_idempotent() {
        let papers = sample_papers();
        for format in [ExportFormat::Ris, ExportFormat::Csv, ExportFormat::Bibtex] {
            let a = format.render(&papers).expect("render");
            let b = format.render(&papers).expect("render");
            assert_eq!(a, b, "{} output differs between runs", format);
        }
    }
}
