//! Two-stage duplicate detection across source results.
//!
//! Stage one is exact DOI identity. Papers without a DOI fall through to fuzzy
//! title matching: Jaccard similarity over the word sets of normalized titles.
//! The pass is single and order sensitive, so the first occurrence of a paper
//! (by source order, then position within the source) is the one kept.

use crate::paper::{Paper, Profile, SourceId, SourceResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Why a paper was classified as a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    Doi,
    Title { similarity: f64 },
}

/// A dropped paper and the kept paper it matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub paper: Paper,
    /// Index into [`DedupOutcome::unique`]
    pub kept_index: usize,
    pub matched_source: SourceId,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    pub total_found: usize,
    pub duplicates_removed: usize,
    pub unique_count: usize,
    /// Unique papers contributed per source
    pub count_by_source: BTreeMap<SourceId, usize>,
    /// `overlap_matrix[a][b]`: papers from `a` dropped as duplicates of a kept paper from `b`
    pub overlap_matrix: BTreeMap<SourceId, BTreeMap<SourceId, usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupOutcome {
    pub unique: Vec<Paper>,
    pub duplicates: Vec<DuplicateRecord>,
    pub stats: DedupStats,
}

/// Lowercase, turn every non-word character into a space, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    static NON_WORD: OnceLock<Option<Regex>> = OnceLock::new();
    let lower = title.to_lowercase();
    let spaced = match NON_WORD.get_or_init(|| Regex::new(r"[^\w\s]").ok()) {
        Some(re) => re.replace_all(&lower, " ").into_owned(),
        None => lower,
    };
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim and lowercase; `None` for a blank DOI.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let trimmed = doi.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Jaccard similarity of the whitespace token sets of two normalized titles.
///
/// Two empty titles score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokens(a), &tokens(b))
}

fn tokens(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Duplicate detector; cheap to build, holds no state between calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deduplicator {
    /// Minimum Jaccard similarity for a title match
    pub title_threshold: f64,
    /// Also count DOI matches in the overlap matrix
    pub record_doi_overlap: bool,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

impl Deduplicator {
    pub fn new(title_threshold: f64) -> Self {
        Self {
            title_threshold,
            record_doi_overlap: false,
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        Self::new(profile.title_threshold())
    }

    pub fn with_doi_overlap(mut self, enabled: bool) -> Self {
        self.record_doi_overlap = enabled;
        self
    }

    /// Collapse duplicates across `results`, in order.
    pub fn deduplicate(&self, results: &[SourceResult]) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        for result in results {
            outcome.stats.count_by_source.entry(result.source).or_insert(0);
        }
        for &row in outcome.stats.count_by_source.keys() {
            let cols = outcome
                .stats
                .count_by_source
                .keys()
                .map(|&col| (col, 0))
                .collect();
            outcome.stats.overlap_matrix.insert(row, cols);
        }

        let mut seen_dois: HashMap<String, usize> = HashMap::new();
        // (normalized title, kept index); token sets are rebuilt from the owned strings
        let mut kept_titles: Vec<(String, usize)> = Vec::new();

        for paper in results.iter().flat_map(|r| r.papers.iter()) {
            outcome.stats.total_found += 1;
            let normalized = normalize_title(&paper.title);

            let matched = match paper.doi.as_deref().and_then(normalize_doi) {
                Some(doi) => match seen_dois.get(&doi) {
                    Some(&kept) => Some((kept, MatchReason::Doi)),
                    None => {
                        seen_dois.insert(doi, outcome.unique.len());
                        None
                    }
                },
                None => self.match_title(&normalized, &kept_titles),
            };

            match matched {
                Some((kept_index, reason)) => {
                    let matched_source = outcome.unique[kept_index].source;
                    let counts_overlap = match reason {
                        MatchReason::Title { .. } => true,
                        MatchReason::Doi => self.record_doi_overlap,
                    };
                    if counts_overlap {
                        *outcome
                            .stats
                            .overlap_matrix
                            .entry(paper.source)
                            .or_default()
                            .entry(matched_source)
                            .or_insert(0) += 1;
                    }
                    debug!(
                        source = %paper.source,
                        matched_source = %matched_source,
                        reason = ?reason,
                        title = %paper.title,
                        "Duplicate"
                    );
                    outcome.duplicates.push(DuplicateRecord {
                        paper: paper.clone(),
                        kept_index,
                        matched_source,
                        reason,
                    });
                }
                None => {
                    kept_titles.push((normalized, outcome.unique.len()));
                    *outcome.stats.count_by_source.entry(paper.source).or_insert(0) += 1;
                    outcome.unique.push(paper.clone());
                }
            }
        }

        outcome.stats.unique_count = outcome.unique.len();
        outcome.stats.duplicates_removed = outcome.duplicates.len();
        info!(
            total_found = outcome.stats.total_found,
            unique = outcome.stats.unique_count,
            duplicates = outcome.stats.duplicates_removed,
            "Deduplication complete"
        );
        outcome
    }

    /// First kept title, in keep order, at or above the threshold.
    fn match_title(&self, normalized: &str, kept_titles: &[(String, usize)]) -> Option<(usize, MatchReason)> {
        let candidate = tokens(normalized);
        kept_titles.iter().find_map(|(kept, index)| {
            let similarity = jaccard(&candidate, &tokens(kept));
            (similarity >= self.title_threshold).then_some((*index, MatchReason::Title { similarity }))
        })
    }
}
