//! RIS export.
//!
//! Tags per record, always in this order: `TY`, `TI`, `AB`, `JO`, `PY`, `DO`,
//! `AN` (PMID), `UR`, one `AU` per author, `N1` (source), `ER`. Optional tags
//! are omitted when the value is missing.
//!
//! Every value is written on a single line: embedded line breaks and runs of
//! whitespace collapse to one space. This loss is intended, RIS has no
//! continuation lines. Use the CSV export when abstracts must keep their
//! line breaks.

use crate::paper::Paper;

/// Render one RIS record per paper, separated by blank lines.
pub fn to_ris(papers: &[Paper]) -> String {
    papers
        .iter()
        .map(record)
        .collect::<Vec<_>>()
        .join("\n")
}

fn record(paper: &Paper) -> String {
    let mut lines = Vec::new();
    push_line(&mut lines, "TY", Some("JOUR"));
    push_line(&mut lines, "TI", Some(paper.title.as_str()));
    push_line(&mut lines, "AB", paper.abstract_text.as_deref());
    push_line(&mut lines, "JO", paper.journal.as_deref());
    push_line(&mut lines, "PY", paper.year.map(|y| y.to_string()).as_deref());
    push_line(&mut lines, "DO", paper.doi.as_deref());
    push_line(&mut lines, "AN", paper.pmid.as_deref());
    push_line(&mut lines, "UR", paper.url.as_deref());
    for author in &paper.authors {
        push_line(&mut lines, "AU", Some(author.name.as_str()));
    }
    let source = format!("Source: {}", paper.source);
    push_line(&mut lines, "N1", Some(source.as_str()));
    lines.push("ER  - ".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// `TAG  - value`; RIS is line based, so embedded newlines become spaces.
fn push_line(lines: &mut Vec<String>, tag: &str, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return;
    }
    lines.push(format!("{tag}  - {value}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sample_papers;

    fn tags(record: &str) -> Vec<&str> {
        record
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| &l[..2])
            .collect()
    }

    #[test]
    fn test_tag_order_with_all_fields() {
        let papers = sample_papers();
        let ris = to_ris(&papers[..1]);
        assert_eq!(
            tags(&ris),
            vec!["TY", "TI", "AB", "JO", "PY", "DO", "AN", "UR", "AU", "AU", "N1", "ER"]
        );
        assert!(ris.contains("AB  - Line one line two, with comma\n"));
        assert!(ris.contains("N1  - Source: pubmed\n"));
        assert!(ris.starts_with("TY  - JOUR\nTI  - Metformin, aging & \"healthspan\"\n"));
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let papers = sample_papers();
        let ris = to_ris(&papers[1..]);
        assert_eq!(tags(&ris), vec!["TY", "TI", "N1", "ER"]);
    }

    #[test]
    fn test_records_separated_by_blank_line() {
        let ris = to_ris(&sample_papers());
        assert_eq!(ris.matches("ER  - \n\nTY  - JOUR").count(), 1);
        assert!(ris.ends_with("ER  - \n"));
        assert_eq!(to_ris(&[]), "");
    }

    #[test]
    fn test_multiline_values_fold_to_one_line() {
        let mut paper = sample_papers().remove(0);
        paper.abstract_text = Some("Background:\n  metformin\r\nResults: none".to_string());
        let ris = to_ris(&[paper]);
        assert!(ris.contains("AB  - Background: metformin Results: none\n"));
        assert!(ris.lines().all(|l| l.is_empty() || l.get(2..6) == Some("  - ")));
    }
}
