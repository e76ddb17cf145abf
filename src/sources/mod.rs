//! Source adapters, one per external bibliographic database.
//!
//! Every adapter implements [`SourceAdapter`]. The source-specific work lives in
//! [`SourceAdapter::fetch`]; callers use the provided [`SourceAdapter::search`],
//! which times the call and folds any error into the returned [`SourceResult`].

pub mod core_ac;
pub mod crossref;
pub mod europe_pmc;
pub mod google_scholar;
pub mod openalex;
pub mod preprints;
pub mod pubmed;
pub mod semantic_scholar;
pub mod ssrn;

use crate::config::Config;
use crate::error::{LitSearchError, Result};
use crate::paper::{Paper, SourceId, SourceResult};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// User agent sent to every JSON API
pub(crate) const USER_AGENT: &str = "litsearch/0.1 (+https://github.com/litsearch/litsearch)";

/// Default request timeout for JSON APIs
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries on HTTP 429 before giving up
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// First backoff step on HTTP 429, doubled per retry
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Papers plus the source's own hit count, before timing is attached
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub papers: Vec<Paper>,
    pub total_available: u64,
}

impl SourceBatch {
    pub fn new(papers: Vec<Paper>, total_available: u64) -> Self {
        Self {
            papers,
            total_available,
        }
    }
}

/// One integration against a single external database.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which database this adapter talks to
    fn id(&self) -> SourceId;

    /// Run the source-specific request(s) and map the response into papers.
    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch>;

    /// Search this source. Never fails: errors become `SourceResult::error`.
    ///
    /// `elapsed_ms` covers every sub-request `fetch` makes.
    async fn search(&self, query: &str, max_results: usize) -> SourceResult {
        let source = self.id();
        let started = Instant::now();
        let outcome = self.fetch(query, max_results).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut batch) => {
                batch.papers.truncate(max_results);
                let total = batch.total_available.max(batch.papers.len() as u64);
                info!(
                    source = %source,
                    returned = batch.papers.len(),
                    total_available = total,
                    elapsed_ms,
                    "Source search complete"
                );
                SourceResult::success(source, batch.papers, total, elapsed_ms)
            }
            Err(e) => {
                warn!(source = %source, error = %e, elapsed_ms, "Source search failed");
                SourceResult::failure(source, elapsed_ms, e.to_string())
            }
        }
    }
}

/// Build a JSON API client with the shared user agent and timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| LitSearchError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request, backing off exponentially on HTTP 429, and return the body.
pub(crate) async fn fetch_text(request: reqwest::RequestBuilder, source: SourceId) -> Result<String> {
    let mut retries = 0;

    loop {
        let attempt = request
            .try_clone()
            .ok_or_else(|| LitSearchError::Config("request cannot be retried".to_string()))?;
        let response = attempt.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retries < MAX_RATE_LIMIT_RETRIES {
                let backoff = BASE_BACKOFF * 2u32.pow(retries);
                warn!(
                    source = %source,
                    retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                retries += 1;
                continue;
            }
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(LitSearchError::RateLimited(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        debug!(source = %source, status = status.as_u16(), body = %body, "API error body");
        return Err(LitSearchError::Api {
            code: status.as_u16(),
            message: format!("{} API error: {}", source.display_name(), status),
        });
    }
}

/// [`fetch_text`] followed by JSON decoding into `T`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    source: SourceId,
) -> Result<T> {
    let body = fetch_text(request, source).await?;
    serde_json::from_str(&body).map_err(|e| {
        LitSearchError::Parse(format!(
            "Failed to parse {} response: {}",
            source.display_name(),
            e
        ))
    })
}

/// Strip HTML/JATS tags and collapse whitespace.
pub(crate) fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match TAGS.get_or_init(|| Regex::new(r"<[^>]+>").ok()) {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scraper settings taken from `config`.
fn scholar_options(config: &Config) -> google_scholar::ScholarOptions {
    google_scholar::ScholarOptions {
        base_url: config.base_url(SourceId::GoogleScholar),
        proxy: config.scholar_proxy.clone(),
        cookie_file: config.scholar_cookie_file.clone(),
        timeout: config.request_timeout(),
        ..Default::default()
    }
}

/// Adapters available for a request, keyed by source id.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: BTreeMap<SourceId, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every adapter from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        let timeout = config.request_timeout();
        let base = |id: SourceId| config.base_url(id);

        registry.register(Arc::new(pubmed::PubMedAdapter::new(
            base(SourceId::Pubmed),
            config.ncbi_api_key.clone(),
            timeout,
        )?));
        registry.register(Arc::new(openalex::OpenAlexAdapter::new(
            base(SourceId::OpenAlex),
            config.mailto.clone(),
            timeout,
        )?));
        registry.register(Arc::new(semantic_scholar::SemanticScholarAdapter::new(
            base(SourceId::SemanticScholar),
            config.semantic_scholar_api_key.clone(),
            timeout,
        )?));
        registry.register(Arc::new(europe_pmc::EuropePmcAdapter::new(
            base(SourceId::EuropePmc),
            timeout,
        )?));
        for server in [preprints::PreprintServer::Medrxiv, preprints::PreprintServer::Biorxiv] {
            registry.register(Arc::new(preprints::PreprintAdapter::new(
                server,
                base(server.source_id()),
                timeout,
            )?));
        }
        registry.register(Arc::new(crossref::CrossrefAdapter::new(
            base(SourceId::Crossref),
            config.mailto.clone(),
            timeout,
        )?));
        registry.register(Arc::new(core_ac::CoreAdapter::new(
            base(SourceId::Core),
            config.core_api_key.clone(),
            timeout,
        )?));
        registry.register(Arc::new(google_scholar::GoogleScholarAdapter::new(
            scholar_options(config),
        )?));
        registry.register(Arc::new(ssrn::SsrnAdapter::new(
            base(SourceId::Ssrn),
            config.mailto.clone(),
            timeout,
        )?));

        info!(sources = registry.adapters.len(), "Source registry ready");
        Ok(registry)
    }

    /// Add or replace the adapter for `adapter.id()`.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, id: SourceId) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&id).cloned()
    }

    /// Registered ids, in [`SourceId`] order
    pub fn ids(&self) -> Vec<SourceId> {
        self.adapters.keys().copied().collect()
    }
}
