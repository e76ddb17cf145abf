//! Concurrent fan-out over the selected source adapters.
//!
//! Every selected adapter runs exactly once and all of them are awaited before
//! returning. The result vector lines up with the selection order, which the
//! deduplicator depends on.

use crate::paper::{SourceId, SourceResult};
use crate::sources::{SourceAdapter, SourceRegistry};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

/// Search every id in `selected` concurrently.
///
/// Ids with no registered adapter come back as failure envelopes.
pub async fn search_all(
    registry: &SourceRegistry,
    query: &str,
    selected: &[SourceId],
    max_results: usize,
    per_source_timeout: Option<Duration>,
) -> Vec<SourceResult> {
    info!(query, sources = ?selected, max_results, "Fanning out search");

    let futures: Vec<_> = selected
        .iter()
        .map(|&id| {
            let adapter = registry.get(id);
            async move {
                match adapter {
                    Some(adapter) => run_adapter(adapter, query, max_results, per_source_timeout).await,
                    None => {
                        warn!(source = %id, "No adapter registered");
                        SourceResult::failure(id, 0, format!("source '{}' is not available", id))
                    }
                }
            }
        })
        .collect();

    let results = join_all(futures).await;
    log_summary(&results);
    results
}

/// Same as [`search_all`] for callers that already hold the adapters.
pub async fn search_adapters(
    adapters: &[Arc<dyn SourceAdapter>],
    query: &str,
    max_results: usize,
    per_source_timeout: Option<Duration>,
) -> Vec<SourceResult> {
    let futures: Vec<_> = adapters
        .iter()
        .map(|adapter| run_adapter(Arc::clone(adapter), query, max_results, per_source_timeout))
        .collect();

    let results = join_all(futures).await;
    log_summary(&results);
    results
}

async fn run_adapter(
    adapter: Arc<dyn SourceAdapter>,
    query: &str,
    max_results: usize,
    per_source_timeout: Option<Duration>,
) -> SourceResult {
    let id = adapter.id();
    let start = Instant::now();
    // A panicking adapter must not take the other searches down with it
    let search = AssertUnwindSafe(adapter.search(query, max_results)).catch_unwind();

    let outcome = match per_source_timeout {
        Some(limit) => match timeout(limit, search).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(source = %id, timeout_ms = limit.as_millis() as u64, "Source timed out");
                return SourceResult::failure(
                    id,
                    start.elapsed().as_millis() as u64,
                    format!("timed out after {} ms", limit.as_millis()),
                );
            }
        },
        None => search.await,
    };

    outcome.unwrap_or_else(|_| {
        warn!(source = %id, "Source adapter panicked");
        SourceResult::failure(id, start.elapsed().as_millis() as u64, "adapter panicked")
    })
}

fn log_summary(results: &[SourceResult]) {
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let papers: usize = results.iter().map(|r| r.papers.len()).sum();
    info!(
        succeeded,
        failed = results.len() - succeeded,
        papers,
        "Fan-out complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{paper, ScriptedAdapter};

    fn registry_of(adapters: Vec<Arc<ScriptedAdapter>>) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_sources() {
        let a = Arc::new(ScriptedAdapter::ok(
            SourceId::Pubmed,
            vec![paper(SourceId::Pubmed, "A1", None), paper(SourceId::Pubmed, "A2", None)],
        ));
        let b = Arc::new(ScriptedAdapter::failing(SourceId::OpenAlex, "upstream 503"));
        let c = Arc::new(ScriptedAdapter::ok(
            SourceId::EuropePmc,
            vec![paper(SourceId::EuropePmc, "C1", None)],
        ));
        let registry = registry_of(vec![a.clone(), b.clone(), c.clone()]);

        let selected = [SourceId::Pubmed, SourceId::OpenAlex, SourceId::EuropePmc];
        let results = search_all(&registry, "q", &selected, 10, None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().map(|r| r.source).collect::<Vec<_>>(), selected.to_vec());
        assert_eq!(results[0].papers.len(), 2);
        assert!(results[1].papers.is_empty());
        assert!(results[1].error.as_deref().unwrap_or_default().contains("upstream 503"));
        assert_eq!(results[2].papers.len(), 1);

        for adapter in [&a, &b, &c] {
            assert_eq!(adapter.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_waits_for_slow_source_and_keeps_order() {
        let slow = Arc::new(
            ScriptedAdapter::ok(SourceId::Crossref, vec![paper(SourceId::Crossref, "Slow", None)])
                .delayed(Duration::from_millis(80)),
        );
        let fast = Arc::new(ScriptedAdapter::ok(
            SourceId::Core,
            vec![paper(SourceId::Core, "Fast", None)],
        ));
        let registry = registry_of(vec![slow, fast]);

        let selected = [SourceId::Crossref, SourceId::Core];
        let results = search_all(&registry, "q", &selected, 10, None).await;

        assert_eq!(results[0].source, SourceId::Crossref);
        assert_eq!(results[0].papers[0].title, "Slow");
        assert!(results[0].elapsed_ms >= 80);
        assert_eq!(results[1].papers[0].title, "Fast");
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let slow = Arc::new(
            ScriptedAdapter::ok(SourceId::Ssrn, vec![paper(SourceId::Ssrn, "Late", None)])
                .delayed(Duration::from_millis(500)),
        );
        let fast = Arc::new(ScriptedAdapter::ok(SourceId::Crossref, Vec::new()));
        let registry = registry_of(vec![slow, fast]);

        let results = search_all(
            &registry,
            "q",
            &[SourceId::Ssrn, SourceId::Crossref],
            10,
            Some(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(results[0].error.as_deref(), Some("timed out after 50 ms"));
        assert!(results[0].papers.is_empty());
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_unregistered_source_is_failure() {
        let registry = SourceRegistry::new();
        let results = search_all(&registry, "q", &[SourceId::Core], 10, None).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
        assert_eq!(results[0].total_available, 0);
    }

    #[tokio::test]
    async fn test_search_adapters_direct() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(ScriptedAdapter::failing(SourceId::Pubmed, "down")),
            Arc::new(ScriptedAdapter::ok(SourceId::Biorxiv, vec![paper(SourceId::Biorxiv, "P", None)])),
        ];
        let results = search_adapters(&adapters, "q", 5, None).await;
        assert!(!results[0].is_success());
        assert_eq!(results[1].papers.len(), 1);
    }
}
