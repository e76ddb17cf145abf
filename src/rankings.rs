//! Journal rankings for business and management reviews.
//!
//! Rankings come from a reference CSV (`journal,issn,tier,abs,abdc,ft50`) and
//! are matched on normalized journal names. Enrichment wraps each paper in a
//! [`RankedPaper`]; the paper itself is never modified.

use crate::error::{LitSearchError, Result};
use crate::paper::Paper;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Tier given to journals missing from the table
pub const UNRANKED_TIER: u8 = 5;

/// Ranking data for one journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRanking {
    pub journal: String,
    pub issn: Option<String>,
    /// 1 (best) to 5
    pub tier: u8,
    /// Chartered ABS Academic Journal Guide grade ("1" to "4*")
    pub abs_rating: Option<String>,
    /// ABDC grade ("A*", "A", "B", "C")
    pub abdc_rating: Option<String>,
    pub is_ft50: bool,
}

/// Anything that can resolve a normalized journal key to a ranking.
pub trait JournalLookup {
    fn lookup(&self, key: &str) -> Option<JournalRanking>;
}

/// Paper plus the ranking of its journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPaper {
    #[serde(flatten)]
    pub paper: Paper,
    pub journal_issn: Option<String>,
    pub journal_tier: u8,
    pub abs_rating: Option<String>,
    pub abdc_rating: Option<String>,
    pub is_ft50: bool,
}

impl RankedPaper {
    fn new(paper: Paper, ranking: Option<JournalRanking>) -> Self {
        match ranking {
            Some(r) => Self {
                paper,
                journal_issn: r.issn,
                journal_tier: r.tier,
                abs_rating: r.abs_rating,
                abdc_rating: r.abdc_rating,
                is_ft50: r.is_ft50,
            },
            None => Self {
                paper,
                journal_issn: None,
                journal_tier: UNRANKED_TIER,
                abs_rating: None,
                abdc_rating: None,
                is_ft50: false,
            },
        }
    }

    /// Whether this paper satisfies every constraint in `filter`.
    pub fn passes(&self, filter: &RankingFilter) -> bool {
        if let Some(max_tier) = filter.max_tier {
            if self.journal_tier > max_tier {
                return false;
            }
        }
        if let Some(min_abs) = filter.min_abs {
            if !passes_numeric_filter(self.abs_rating.as_deref().and_then(abs_score), min_abs) {
                return false;
            }
        }
        if !filter.abdc.is_empty() {
            let accepted = self.abdc_rating.as_deref().is_some_and(|grade| {
                filter
                    .abdc
                    .iter()
                    .any(|want| want.trim().eq_ignore_ascii_case(grade.trim()))
            });
            if !accepted {
                return false;
            }
        }
        !filter.ft50_only || self.is_ft50
    }
}

/// Constraints applied after enrichment. The default passes everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingFilter {
    /// Keep tiers 1..=max_tier
    pub max_tier: Option<u8>,
    /// Minimum ABS grade, "4*" counts as 4.5
    pub min_abs: Option<f64>,
    /// Accepted ABDC grades, empty accepts any
    pub abdc: Vec<String>,
    pub ft50_only: bool,
}

impl RankingFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Numeric ABS grade; "4*" sorts above "4".
pub fn abs_score(rating: &str) -> Option<f64> {
    let rating = rating.trim();
    match rating.strip_suffix('*') {
        Some(base) => base.trim().parse::<f64>().ok().map(|v| v + 0.5),
        None => rating.parse().ok(),
    }
}

fn passes_numeric_filter(value: Option<f64>, threshold: f64) -> bool {
    value.map(|v| v >= threshold).unwrap_or(false)
}

/// Lowercase, `&` to "and", strip punctuation, collapse whitespace.
pub fn normalize_journal(name: &str) -> String {
    let replaced = name.to_lowercase().replace('&', " and ");
    let cleaned: String = replaced
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ISSN without the hyphen, uppercased (`0143-2095` -> `01432095`)
fn normalize_issn(issn: &str) -> String {
    issn.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Distinct normalized journal names across `papers`.
pub fn journal_keys(papers: &[Paper]) -> BTreeSet<String> {
    papers
        .iter()
        .filter_map(|p| p.journal.as_deref())
        .map(normalize_journal)
        .filter(|k| !k.is_empty())
        .collect()
}

/// Wrap every paper with its journal's ranking, tier 5 when unranked.
pub fn enrich(papers: &[Paper], lookup: &dyn JournalLookup) -> Vec<RankedPaper> {
    let mut cache: HashMap<String, Option<JournalRanking>> = HashMap::new();
    let ranked: Vec<RankedPaper> = papers
        .iter()
        .map(|paper| {
            let key = paper.journal.as_deref().map(normalize_journal).unwrap_or_default();
            let ranking = if key.is_empty() {
                None
            } else {
                cache
                    .entry(key)
                    .or_insert_with_key(|k| lookup.lookup(k))
                    .clone()
            };
            RankedPaper::new(paper.clone(), ranking)
        })
        .collect();

    let matched = ranked.iter().filter(|r| r.journal_tier < UNRANKED_TIER).count();
    info!(total = ranked.len(), ranked = matched, "Journal enrichment complete");
    ranked
}

/// [`enrich`] then keep only papers passing `filter`.
pub fn enrich_and_filter(papers: &[Paper], lookup: &dyn JournalLookup, filter: &RankingFilter) -> Vec<RankedPaper> {
    let before = papers.len();
    let kept: Vec<RankedPaper> = enrich(papers, lookup)
        .into_iter()
        .filter(|r| r.passes(filter))
        .collect();
    info!(before, after = kept.len(), "Ranking filter applied");
    kept
}

#[derive(Debug, Deserialize)]
struct RankingRow {
    journal: String,
    issn: Option<String>,
    tier: Option<u8>,
    abs: Option<String>,
    abdc: Option<String>,
    ft50: Option<String>,
}

/// In-memory ranking table indexed by normalized name and ISSN.
///
/// [`enrich`] matches on journal names only, since adapters do not carry
/// ISSNs on [`Paper`]. The ISSN index serves library callers that hold an
/// ISSN, through [`RankingTable::lookup_issn`] or by passing the ISSN as the
/// key to [`JournalLookup::lookup`].
#[derive(Debug, Clone, Default)]
pub struct RankingTable {
    entries: Vec<JournalRanking>,
    by_name: HashMap<String, usize>,
    by_issn: HashMap<String, usize>,
}

impl RankingTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            LitSearchError::Config(format!("Cannot open rankings file {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), journals = table.len(), "Loaded journal rankings");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::default();
        for (line, row) in rdr.deserialize::<RankingRow>().enumerate() {
            let row = row?;
            let tier = row.tier.unwrap_or(UNRANKED_TIER);
            if !(1..=UNRANKED_TIER).contains(&tier) {
                return Err(LitSearchError::Validation(format!(
                    "rankings row {}: tier {} outside 1..=5",
                    line + 2,
                    tier
                )));
            }
            let is_ft50 = row
                .ft50
                .as_deref()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y"))
                .unwrap_or(false);
            table.insert(JournalRanking {
                journal: row.journal,
                issn: row.issn.filter(|s| !s.is_empty()),
                tier,
                abs_rating: row.abs.filter(|s| !s.is_empty()),
                abdc_rating: row.abdc.filter(|s| !s.is_empty()),
                is_ft50,
            });
        }
        Ok(table)
    }

    /// Add an entry; a later entry for the same name or ISSN wins.
    pub fn insert(&mut self, ranking: JournalRanking) {
        let index = self.entries.len();
        let name = normalize_journal(&ranking.journal);
        if !name.is_empty() {
            self.by_name.insert(name, index);
        }
        if let Some(issn) = ranking.issn.as_deref() {
            self.by_issn.insert(normalize_issn(issn), index);
        }
        self.entries.push(ranking);
    }

    /// Exact ISSN match, hyphen and case insensitive. Not used by [`enrich`].
    pub fn lookup_issn(&self, issn: &str) -> Option<&JournalRanking> {
        self.by_issn
            .get(&normalize_issn(issn))
            .and_then(|&i| self.entries.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl JournalLookup for RankingTable {
    /// Normalized name first, then ISSN.
    fn lookup(&self, key: &str) -> Option<JournalRanking> {
        let hit = self
            .by_name
            .get(&normalize_journal(key))
            .and_then(|&i| self.entries.get(i))
            .or_else(|| self.lookup_issn(key))
            .cloned();
        if hit.is_none() {
            debug!(journal = key, "No ranking found");
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "\
journal,issn,tier,abs,abdc,ft50
Strategic Management Journal,0143-2095,1,4*,A*,yes
Journal of Business Research,0148-2963,2,3,A,no
\"Technovation\",0166-4972,3,2,A,
";

    fn table() -> RankingTable {
        RankingTable::from_reader(TABLE.as_bytes()).expect("table")
    }

    fn paper_in(journal: Option<&str>) -> Paper {
        let mut paper = Paper::new(SourceId::Crossref, "Some paper");
        paper.journal = journal.map(str::to_string);
        paper
    }

    #[test]
    fn test_normalize_journal() {
        assert_eq!(normalize_journal("Research  Policy."), "research policy");
        assert_eq!(
            normalize_journal("Entrepreneurship: Theory & Practice"),
            "entrepreneurship theory and practice"
        );
    }

    #[test]
    fn test_lookup_by_name_and_issn() {
        let table = table();
        assert_eq!(table.len(), 3);

        let smj = table.lookup("strategic management journal").expect("by name");
        assert_eq!(smj.tier, 1);
        assert!(smj.is_ft50);
        assert_eq!(abs_score(smj.abs_rating.as_deref().unwrap_or_default()), Some(4.5));

        let jbr = table.lookup("01482963").expect("by issn");
        assert_eq!(jbr.journal, "Journal of Business Research");
        assert_eq!(table.lookup_issn("0166-4972").map(|r| r.tier), Some(3));
        assert!(table.lookup("unknown quarterly").is_none());
    }

    #[test]
    fn test_enrich_defaults_unranked_to_tier_five() {
        let papers = vec![
            paper_in(Some("STRATEGIC MANAGEMENT JOURNAL")),
            paper_in(Some("Unknown Quarterly")),
            paper_in(None),
        ];
        let ranked = enrich(&papers, &table());

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].journal_tier, 1);
        assert_eq!(ranked[0].journal_issn.as_deref(), Some("0143-2095"));
        assert_eq!(ranked[1].journal_tier, UNRANKED_TIER);
        assert_eq!(ranked[2].journal_tier, UNRANKED_TIER);
        assert_eq!(ranked[0].paper, papers[0]);
    }

    #[test]
    fn test_filters() {
        let papers = vec![
            paper_in(Some("Strategic Management Journal")),
            paper_in(Some("Journal of Business Research")),
            paper_in(Some("Technovation")),
            paper_in(Some("Unknown Quarterly")),
        ];
        let table = table();

        let top_tiers = RankingFilter {
            max_tier: Some(2),
            ..Default::default()
        };
        assert_eq!(enrich_and_filter(&papers, &table, &top_tiers).len(), 2);

        let abs3 = RankingFilter {
            min_abs: Some(3.0),
            ..Default::default()
        };
        assert_eq!(enrich_and_filter(&papers, &table, &abs3).len(), 2);

        let abdc = RankingFilter {
            abdc: vec!["a".to_string()],
            ..Default::default()
        };
        assert_eq!(enrich_and_filter(&papers, &table, &abdc).len(), 2);

        let ft50 = RankingFilter {
            ft50_only: true,
            ..Default::default()
        };
        let kept = enrich_and_filter(&papers, &table, &ft50);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].paper.journal.as_deref(), Some("Strategic Management Journal"));

        assert!(RankingFilter::default().is_empty());
        assert_eq!(enrich_and_filter(&papers, &table, &RankingFilter::default()).len(), 4);
    }

    #[test]
    fn test_journal_keys() {
        let papers = vec![
            paper_in(Some("Research Policy")),
            paper_in(Some("research policy.")),
            paper_in(Some("R&D Management")),
            paper_in(None),
        ];
        let keys: Vec<String> = journal_keys(&papers).into_iter().collect();
        assert_eq!(keys, vec!["r and d management", "research policy"]);
    }

    #[test]
    fn test_invalid_tier_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "journal,issn,tier,abs,abdc,ft50\nBad Journal,,9,,,\n")?;
        let err = RankingTable::from_path(file.path()).expect_err("tier 9");
        assert!(err.to_string().contains("tier 9"));
        Ok(())
    }
}
