//! BibTeX export.
//!
//! Field values are escaped for LaTeX and kept on one line. Line breaks in
//! titles and abstracts become spaces; this loss is intended for the
//! line-oriented entry layout. The CSV export keeps them.

use crate::paper::Paper;

/// Render one `@article` entry per paper, separated by blank lines.
pub fn to_bibtex(papers: &[Paper]) -> String {
    papers
        .iter()
        .enumerate()
        .map(|(i, paper)| entry(paper, i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// DOI with every non-alphanumeric character removed, else `paper{position}`.
pub fn cite_key(paper: &Paper, position: usize) -> String {
    let from_doi: String = paper
        .doi
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if from_doi.is_empty() {
        format!("paper{}", position)
    } else {
        from_doi
    }
}

fn entry(paper: &Paper, position: usize) -> String {
    let mut bib = format!("@article{{{},\n", cite_key(paper, position));

    push_field(&mut bib, "title", Some(paper.title.as_str()));
    let authors = paper.author_names().join(" and ");
    push_field(&mut bib, "author", Some(authors.as_str()));
    push_field(&mut bib, "journal", paper.journal.as_deref());
    push_field(&mut bib, "year", paper.year.map(|y| y.to_string()).as_deref());
    push_field(&mut bib, "doi", paper.doi.as_deref());
    push_field(&mut bib, "url", paper.url.as_deref());
    push_field(&mut bib, "abstract", paper.abstract_text.as_deref());

    bib.push_str("}\n");
    bib
}

fn push_field(bib: &mut String, name: &str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    bib.push_str(&format!("  {} = {{{}}},\n", name, escape_bibtex(value)));
}

/// Escape LaTeX special characters.
fn escape_bibtex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sample_papers;

    #[test]
    fn test_cite_keys() {
        let papers = sample_papers();
        assert_eq!(cite_key(&papers[0], 1), "101016jcmet201605011");
        assert_eq!(cite_key(&papers[1], 2), "paper2");
    }

    #[test]
    fn test_entry_fields_in_order() {
        let bib = to_bibtex(&sample_papers());
        let first = bib.split("\n\n").next().unwrap_or_default();
        let fields: Vec<&str> = first
            .lines()
            .skip(1)
            .filter_map(|l| l.trim().split(" = ").next())
            .filter(|f| *f != "}")
            .collect();
        assert_eq!(fields, vec!["title", "author", "journal", "year", "doi", "url", "abstract"]);
        assert!(first.starts_with("@article{101016jcmet201605011,\n"));
        assert!(first.contains("  author = {Barzilai N and Crandall JP},\n"));
        assert!(first.contains("  title = {Metformin, aging \\& \"healthspan\"},\n"));
        assert!(bib.contains("@article{paper2,\n  title = {Untitled preprint notes},\n}\n"));
    }

    #[test]
    fn test_escape_bibtex() {
        assert_eq!(escape_bibtex("50% of R&D_costs"), "50\\% of R\\&D\\_costs");
        assert_eq!(escape_bibtex("{x}"), "\\{x\\}");
        assert_eq!(escape_bibtex("a\\b"), "a\\textbackslash{}b");
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        assert_eq!(escape_bibtex("first line\nsecond\r\nthird"), "first line second  third");
        let mut paper = sample_papers().remove(1);
        paper.title = "Two\nlines".to_string();
        assert!(to_bibtex(&[paper]).contains("  title = {Two lines},\n"));
    }
}
