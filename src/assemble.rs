//! Shapes fan-out and dedup output into the response returned to callers.

use crate::dedup::{DedupOutcome, DedupStats, DuplicateRecord};
use crate::paper::{Paper, SourceId, SourceResult};
use serde::{Deserialize, Serialize};

/// Per-source line of the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakdown {
    pub source: SourceId,
    pub returned_count: usize,
    pub total_available: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SourceResult> for SourceBreakdown {
    fn from(result: &SourceResult) -> Self {
        Self {
            source: result.source,
            returned_count: result.papers.len(),
            total_available: result.total_available,
            elapsed_ms: result.elapsed_ms,
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub sources_requested: Vec<SourceId>,
    /// Deduplicated papers, in keep order
    pub papers: Vec<Paper>,
    pub total_unique: usize,
    pub total_found: usize,
    pub duplicates_removed: usize,
    pub per_source_breakdown: Vec<SourceBreakdown>,
    pub stats: DedupStats,
    /// Sum of per-source elapsed times (sources run concurrently, so this
    /// exceeds wall-clock time)
    pub total_elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<DuplicateRecord>,
}

impl SearchResponse {
    pub fn succeeded_sources(&self) -> Vec<SourceId> {
        self.per_source_breakdown
            .iter()
            .filter(|b| b.error.is_none())
            .map(|b| b.source)
            .collect()
    }

    /// `(source, error)` for every source that failed
    pub fn failed_sources(&self) -> Vec<(SourceId, &str)> {
        self.per_source_breakdown
            .iter()
            .filter_map(|b| b.error.as_deref().map(|e| (b.source, e)))
            .collect()
    }

    /// e.g. "3 of 5 databases returned results"
    pub fn coverage_summary(&self) -> String {
        format!(
            "{} of {} databases returned results",
            self.succeeded_sources().len(),
            self.per_source_breakdown.len()
        )
    }
}

/// Build the response. Pure reshaping; nothing is dropped or recomputed
/// beyond the breakdown and elapsed sum.
pub fn assemble(
    query: &str,
    sources_requested: &[SourceId],
    results: &[SourceResult],
    outcome: DedupOutcome,
) -> SearchResponse {
    let per_source_breakdown: Vec<SourceBreakdown> = results.iter().map(SourceBreakdown::from).collect();
    let total_elapsed_ms: u64 = results.iter().map(|r| r.elapsed_ms).sum();
    let DedupOutcome {
        unique,
        duplicates,
        stats,
    } = outcome;

    SearchResponse {
        query: query.to_string(),
        sources_requested: sources_requested.to_vec(),
        total_unique: unique.len(),
        total_found: stats.total_found,
        duplicates_removed: stats.duplicates_removed,
        papers: unique,
        per_source_breakdown,
        stats,
        total_elapsed_ms,
        duplicates,
    }
}
