//! Runtime configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, the JSON config
//! file, `LITSEARCH_*` environment variables, then CLI flags (applied by the
//! binary after [`Config::load`]).

use crate::error::{LitSearchError, Result};
use crate::paper::{Profile, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Prefix for every environment override
pub const ENV_PREFIX: &str = "LITSEARCH_";

/// Default JSON config path: `<config dir>/litsearch/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("litsearch").join("config.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: Profile,
    /// Overrides the profile's Jaccard threshold
    pub title_threshold: Option<f64>,
    /// Count DOI duplicates in the overlap matrix too
    pub record_doi_overlap: bool,
    /// Default `max_results` per source
    pub max_results: usize,
    /// HTTP client timeout for every adapter
    pub request_timeout_secs: u64,
    /// Wall-clock budget per adapter in the fan-out, unset means unbounded
    pub source_timeout_ms: Option<u64>,
    /// Contact address for OpenAlex and Crossref polite pools
    pub mailto: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
    pub core_api_key: Option<String>,
    pub ncbi_api_key: Option<String>,
    pub scholar_proxy: Option<String>,
    pub scholar_cookie_file: Option<PathBuf>,
    /// Journal ranking CSV used for enrichment
    pub rankings_file: Option<PathBuf>,
    /// Per-source API base URL (mirrors, test servers)
    pub base_urls: BTreeMap<SourceId, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::General,
            title_threshold: None,
            record_doi_overlap: false,
            max_results: 100,
            request_timeout_secs: 30,
            source_timeout_ms: None,
            mailto: None,
            semantic_scholar_api_key: None,
            core_api_key: None,
            ncbi_api_key: None,
            scholar_proxy: None,
            scholar_cookie_file: None,
            rankings_file: None,
            base_urls: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load the config file (explicit path, else the default path if present),
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LitSearchError::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            LitSearchError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply `LITSEARCH_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("PROFILE") {
            self.profile = v.parse()?;
        }
        if let Some(v) = get("TITLE_THRESHOLD") {
            self.title_threshold = Some(parse_env("TITLE_THRESHOLD", &v)?);
        }
        if let Some(v) = get("RECORD_DOI_OVERLAP") {
            self.record_doi_overlap = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("MAX_RESULTS") {
            self.max_results = parse_env("MAX_RESULTS", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("SOURCE_TIMEOUT_MS") {
            self.source_timeout_ms = Some(parse_env("SOURCE_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("MAILTO") {
            self.mailto = Some(v);
        }
        if let Some(v) = get("SEMANTIC_SCHOLAR_API_KEY") {
            self.semantic_scholar_api_key = Some(v);
        }
        if let Some(v) = get("CORE_API_KEY") {
            self.core_api_key = Some(v);
        }
        if let Some(v) = get("NCBI_API_KEY") {
            self.ncbi_api_key = Some(v);
        }
        if let Some(v) = get("SCHOLAR_PROXY") {
            self.scholar_proxy = Some(v);
        }
        if let Some(v) = get("SCHOLAR_COOKIE_FILE") {
            self.scholar_cookie_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RANKINGS_FILE") {
            self.rankings_file = Some(PathBuf::from(v));
        }
        for id in SourceId::ALL {
            let name = format!("{}_BASE_URL", id.as_str().to_ascii_uppercase());
            if let Some(v) = get(&name) {
                self.base_urls.insert(id, v);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.title_threshold {
            if !(t > 0.0 && t <= 1.0) {
                return Err(LitSearchError::Config(format!(
                    "title_threshold must be in (0, 1], got {}",
                    t
                )));
            }
        }
        if self.max_results == 0 {
            return Err(LitSearchError::Config("max_results must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(LitSearchError::Config("request_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Effective Jaccard threshold: explicit override, else the profile default
    pub fn title_threshold(&self) -> f64 {
        self.title_threshold
            .unwrap_or_else(|| self.profile.title_threshold())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.source_timeout_ms.map(Duration::from_millis)
    }

    pub fn base_url(&self, id: SourceId) -> Option<String> {
        self.base_urls.get(&id).cloned()
    }

    /// Per-source readiness notes for `litsearch sources` and `GET /sources`.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        let defaults = self.profile.default_sources();
        SourceId::ALL
            .iter()
            .map(|&id| {
                let note = match id {
                    SourceId::Core if self.core_api_key.is_none() => "Needs CORE API key",
                    SourceId::SemanticScholar if self.semantic_scholar_api_key.is_none() => {
                        "No API key (rate limited)"
                    }
                    SourceId::GoogleScholar if self.scholar_cookie_file.is_none() => {
                        "HTML scraping, no cookies (CAPTCHA likely)"
                    }
                    SourceId::GoogleScholar => "HTML scraping",
                    SourceId::Medrxiv | SourceId::Biorxiv => "Via Europe PMC preprint index",
                    SourceId::Ssrn => "Via Crossref DOI prefix 10.2139",
                    SourceId::OpenAlex | SourceId::Crossref if self.mailto.is_none() => {
                        "No polite pool email"
                    }
                    _ => "Ready",
                };
                SourceStatus {
                    id,
                    name: id.display_name().to_string(),
                    profile_default: defaults.contains(&id),
                    note: note.to_string(),
                }
            })
            .collect()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        LitSearchError::Config(format!("{}{} has invalid value '{}'", ENV_PREFIX, name, value))
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub id: SourceId,
    pub name: String,
    pub profile_default: bool,
    pub note: String,
}
