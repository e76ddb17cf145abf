//! # litsearch
//!
//! Multi-source literature search with deduplication for systematic reviews.
//!
//! ## Modules
//!
//! - [`sources`] - One adapter per bibliographic database
//! - [`fanout`] - Concurrent search across the selected adapters
//! - [`dedup`] - DOI and fuzzy-title deduplication with overlap statistics
//! - [`assemble`] - Response shaping
//! - [`pipeline`] - Validation plus the end-to-end search
//! - [`export`] - RIS, CSV and BibTeX output
//! - [`rankings`] - Journal ranking enrichment and filters
//! - [`config`] - File and environment configuration
//! - [`server`] - HTTP surface
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use litsearch::{Config, LiteratureSearch, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let search = LiteratureSearch::from_config(&config)?;
//!     let response = search.run(&SearchRequest::new("metformin aging")).await?;
//!     println!("{} unique of {} found", response.total_unique, response.total_found);
//!     Ok(())
//! }
//! ```

pub mod assemble;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod fanout;
pub mod paper;
pub mod pipeline;
pub mod rankings;
pub mod server;
pub mod sources;

pub use assemble::SearchResponse;
pub use config::Config;
pub use error::{LitSearchError, Result};
pub use export::ExportFormat;
pub use paper::{Author, Paper, Profile, SourceId, SourceResult};
pub use pipeline::{LiteratureSearch, SearchRequest};
