//! medRxiv and bioRxiv adapters.
//!
//! The preprint servers' own API only lists by date range, so keyword search
//! goes through the Europe PMC preprint index filtered by publisher.

use super::europe_pmc::EuropePmcAdapter;
use super::{SourceAdapter, SourceBatch};
use crate::error::Result;
use crate::paper::SourceId;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprintServer {
    Medrxiv,
    Biorxiv,
}

impl PreprintServer {
    pub fn source_id(&self) -> SourceId {
        match self {
            PreprintServer::Medrxiv => SourceId::Medrxiv,
            PreprintServer::Biorxiv => SourceId::Biorxiv,
        }
    }

    /// Publisher name as indexed by Europe PMC
    pub fn publisher(&self) -> &'static str {
        match self {
            PreprintServer::Medrxiv => "medRxiv",
            PreprintServer::Biorxiv => "bioRxiv",
        }
    }

    fn clause(&self) -> String {
        format!("SRC:PPR AND PUBLISHER:\"{}\"", self.publisher())
    }
}

pub struct PreprintAdapter {
    server: PreprintServer,
    inner: EuropePmcAdapter,
}

impl PreprintAdapter {
    pub fn new(server: PreprintServer, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let inner = EuropePmcAdapter::new(base_url, timeout)?.restricted(server.source_id(), server.clause());
        Ok(Self { server, inner })
    }
}

#[async_trait]
impl SourceAdapter for PreprintAdapter {
    fn id(&self) -> SourceId {
        self.server.source_id()
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let mut batch = self.inner.fetch(query, max_results).await?;
        for paper in &mut batch.papers {
            if paper.journal.is_none() {
                paper.journal = Some(self.server.publisher().to_string());
            }
            if paper.publication_type.is_none() {
                paper.publication_type = Some("preprint".to_string());
            }
        }
        Ok(batch)
    }
}
