//! SSRN adapter.
//!
//! SSRN has no public search API. Every SSRN paper is registered with Crossref
//! under the `10.2139` DOI prefix, so this searches Crossref restricted to
//! that prefix and reports the results as `ssrn`.

use super::crossref::CrossrefAdapter;
use super::{SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::SourceId;
use async_trait::async_trait;
use std::time::Duration;

/// Crossref DOI prefix owned by SSRN
pub const SSRN_DOI_PREFIX: &str = "10.2139";

pub struct SsrnAdapter {
    inner: CrossrefAdapter,
}

impl SsrnAdapter {
    pub fn new(base_url: Option<String>, mailto: Option<String>, timeout: Duration) -> Result<Self> {
        let inner = CrossrefAdapter::new(base_url, mailto, timeout)?
            .restricted(SourceId::Ssrn, format!("prefix:{}", SSRN_DOI_PREFIX));
        Ok(Self { inner })
    }
}

#[async_trait]
impl SourceAdapter for SsrnAdapter {
    fn id(&self) -> SourceId {
        SourceId::Ssrn
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let mut batch = self.inner.fetch(query, max_results).await?;
        for paper in &mut batch.papers {
            if paper.url.is_none() {
                paper.url = paper
                    .doi
                    .as_deref()
                    .and_then(|doi| doi.strip_prefix("10.2139/ssrn."))
                    .map(|id| format!("https://papers.ssrn.com/sol3/papers.cfm?abstract_id={}", id));
            }
        }
        Ok(batch)
    }
}
