//! litsearch - multi-source literature search for systematic reviews
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! litsearch search "metformin aging" --sources pubmed,openalex --format ris --output ./output
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! litsearch serve --port 3000
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use litsearch::rankings::{self, RankedPaper, RankingFilter, RankingTable};
use litsearch::server::{self, AppState};
use litsearch::{Config, ExportFormat, LiteratureSearch, Profile, SearchRequest, SearchResponse, SourceId};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Multi-source literature search with deduplication
#[derive(Parser)]
#[command(name = "litsearch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: <config dir>/litsearch/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Deployment profile: general or business
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every selected database and deduplicate the results
    Search {
        /// Search query
        query: String,

        /// Comma-separated source ids (default: the profile's sources)
        #[arg(long)]
        sources: Option<String>,

        /// Results requested per source
        #[arg(long)]
        max_results: Option<usize>,

        /// Output format
        #[arg(long, default_value = "json", value_parser = ["json", "ris", "csv", "bibtex"])]
        format: String,

        /// Output directory; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        // === Journal Rankings ===
        /// Journal ranking CSV (journal,issn,tier,abs,abdc,ft50)
        #[arg(long)]
        rankings: Option<PathBuf>,

        /// Filter: journal tier <= value
        #[arg(long)]
        max_tier: Option<u8>,

        /// Filter: ABS grade >= value ("4*" counts as 4.5)
        #[arg(long)]
        min_abs: Option<f64>,

        /// Filter: accepted ABDC grades (e.g., "A*,A")
        #[arg(long)]
        abdc: Option<String>,

        /// Filter: FT50 journals only
        #[arg(long)]
        ft50: bool,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// List sources and their readiness
    Sources,
}

struct SearchArgs {
    query: String,
    sources: Option<String>,
    max_results: Option<usize>,
    format: String,
    output: Option<PathBuf>,
    rankings: Option<PathBuf>,
    filter: RankingFilter,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(profile) = cli.profile.as_deref() {
        config.profile = profile.parse::<Profile>().context("Invalid --profile")?;
    }

    match cli.command {
        Commands::Search {
            query,
            sources,
            max_results,
            format,
            output,
            rankings,
            max_tier,
            min_abs,
            abdc,
            ft50,
        } => {
            let filter = RankingFilter {
                max_tier,
                min_abs,
                abdc: abdc
                    .map(|list| {
                        list.split(',')
                            .map(|g| g.trim().to_string())
                            .filter(|g| !g.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                ft50_only: ft50,
            };
            let args = SearchArgs {
                query,
                sources,
                max_results,
                format,
                output,
                rankings,
                filter,
            };
            run_search(config, args).await
        }
        Commands::Serve { port, host } => run_server(config, host, port).await,
        Commands::Sources => {
            print_sources(&config);
            Ok(())
        }
    }
}

// ============================================================================
// Search
// ============================================================================

async fn run_search(mut config: Config, args: SearchArgs) -> Result<()> {
    if let Some(path) = args.rankings {
        config.rankings_file = Some(path);
    }
    config.validate().context("Invalid configuration")?;

    let format = match args.format.as_str() {
        "json" => None,
        other => Some(other.parse::<ExportFormat>()?),
    };

    let mut request = SearchRequest::new(args.query.clone());
    if let Some(list) = args.sources.as_deref() {
        request = request.with_sources(&SourceId::parse_list(list)?);
    }
    request.max_results = args.max_results;

    let search = LiteratureSearch::from_config(&config).context("Failed to build source adapters")?;
    let response = search.run(&request).await?;

    eprintln!("{}", response.coverage_summary());
    for (source, error) in response.failed_sources() {
        eprintln!("  {} failed: {}", source.display_name(), error);
    }
    eprintln!(
        "Found {} papers, {} unique after removing {} duplicates",
        response.total_found, response.total_unique, response.duplicates_removed
    );

    let ranked = match config.rankings_file.as_deref() {
        Some(path) => Some(rank_papers(path, &response, &args.filter)?),
        None => {
            if !args.filter.is_empty() {
                warn!("Ranking filters given without a rankings file, ignoring them");
            }
            None
        }
    };

    let Some(output_dir) = args.output else {
        let body = match format {
            Some(format) => format.render(&response.papers)?,
            None => serde_json::to_string_pretty(&response)?,
        };
        println!("{}", body);
        return Ok(());
    };

    let output_folder = output_folder(&output_dir, &args.query)?;
    println!("Output folder: {}", output_folder.display());

    let response_path = output_folder.join("response.json");
    std::fs::write(&response_path, serde_json::to_string_pretty(&response)?)
        .context("Failed to write response JSON")?;
    println!("Saved: {:?}", response_path);

    if let Some(format) = format {
        let export_path = output_folder.join(format!("papers.{}", format.extension()));
        std::fs::write(&export_path, format.render(&response.papers)?)
            .context("Failed to write export file")?;
        println!("Saved: {:?}", export_path);
    }

    if let Some(ranked) = ranked {
        let ranked_path = output_folder.join("ranked.json");
        std::fs::write(&ranked_path, serde_json::to_string_pretty(&ranked)?)
            .context("Failed to write ranked papers")?;
        println!("Saved: {:?}", ranked_path);
    }

    println!("\n✓ Search complete. Results in: {}", output_folder.display());
    Ok(())
}

fn rank_papers(path: &Path, response: &SearchResponse, filter: &RankingFilter) -> Result<Vec<RankedPaper>> {
    let table = RankingTable::from_path(path)
        .with_context(|| format!("Failed to load rankings from {}", path.display()))?;
    eprintln!("Loaded {} journal rankings", table.len());

    let ranked = rankings::enrich_and_filter(&response.papers, &table, filter);
    if filter.is_empty() {
        eprintln!("Enriched: {} papers with ranking data", ranked.len());
    } else {
        eprintln!("Filtered: {} of {} papers", ranked.len(), response.papers.len());
    }
    Ok(ranked)
}

/// `<dir>/<timestamp>_<sanitized query>`, created on disk.
fn output_folder(output_dir: &Path, query: &str) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let safe_query: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    let folder = output_dir.join(format!("{}_{}", timestamp, safe_query));
    std::fs::create_dir_all(&folder).context("Failed to create output directory")?;
    Ok(folder)
}

fn print_sources(config: &Config) {
    println!("Profile: {:?}", config.profile);
    for status in config.source_status() {
        let marker = if status.profile_default { "*" } else { " " };
        println!("{} {:<18} {:<16} {}", marker, status.id, status.name, status.note);
    }
    println!("\n* searched by default");
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(config: Config, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, profile = ?config.profile, "Starting HTTP server");
    config.validate().context("Invalid configuration")?;

    let search = LiteratureSearch::from_config(&config).context("Failed to build source adapters")?;
    let state = Arc::new(AppState { search, config });

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;
    println!("Listening on http://{}", addr);

    server::serve(addr, state).await.context("Server error")?;
    Ok(())
}
