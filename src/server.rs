//! HTTP surface.
//!
//! Routes:
//! - `GET /health`
//! - `GET /sources`: every source with its readiness note
//! - `POST /search`: [`SearchRequest`] in, [`SearchResponse`] out
//! - `POST /export?format=ris|csv|bibtex`: runs a search and returns the export

use crate::assemble::SearchResponse;
use crate::config::{Config, SourceStatus};
use crate::error::LitSearchError;
use crate::export::ExportFormat;
use crate::paper::SourceId;
use crate::pipeline::{LiteratureSearch, SearchRequest};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct AppState {
    pub search: LiteratureSearch,
    pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sources", get(sources_handler))
        .route("/search", post(search_handler))
        .route("/export", post(export_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(state)).await
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn sources_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SourceStatus>> {
    Json(state.config.source_status())
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    info!(query = %req.query, sources = ?req.sources, "Search request");
    let response = state.search.run(&req).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    format: String,
}

async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    Json(req): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = params.format.parse()?;
    info!(query = %req.query, format = %format, "Export request");

    let response = state.search.run(&req).await?;
    let body = format.render(&response.papers)?;
    let disposition = format!("attachment; filename=\"litsearch.{}\"", format.extension());

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct FailureBody {
    source: SourceId,
    error: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureBody>,
}

/// Maps [`LitSearchError`] onto HTTP status codes
pub struct ApiError(LitSearchError);

impl From<LitSearchError> for ApiError {
    fn from(e: LitSearchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            LitSearchError::AllSourcesFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let message = self.0.to_string();
        let failures = match self.0 {
            LitSearchError::AllSourcesFailed { failures } => failures
                .into_iter()
                .map(|(source, error)| FailureBody { source, error })
                .collect(),
            _ => Vec::new(),
        };
        (status, Json(ErrorBody { error: message, failures })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{paper, ScriptedAdapter};
    use crate::sources::SourceRegistry;
    use serde_json::{json, Value};

    async fn spawn(adapters: Vec<ScriptedAdapter>) -> String {
        let mut registry = SourceRegistry::new();
        for adapter in adapters {
            registry.register(Arc::new(adapter));
        }
        let config = Config::default();
        let state = Arc::new(AppState {
            search: LiteratureSearch::new(registry, &config),
            config,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{}", addr)
    }

    fn two_sources() -> Vec<ScriptedAdapter> {
        vec![
            ScriptedAdapter::ok(
                SourceId::Pubmed,
                vec![paper(SourceId::Pubmed, "Exercise and depression", Some("10.1/e"))],
            ),
            ScriptedAdapter::failing(SourceId::OpenAlex, "HTTP 500"),
        ]
    }

    #[tokio::test]
    async fn test_health_and_sources() {
        let base = spawn(Vec::new()).await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{}/health", base)).send().await.expect("health");
        assert_eq!(health.text().await.expect("body"), "OK");

        let sources: Value = client
            .get(format!("{}/sources", base))
            .send()
            .await
            .expect("sources")
            .json()
            .await
            .expect("json");
        assert_eq!(sources.as_array().map(Vec::len), Some(SourceId::ALL.len()));
    }

    #[tokio::test]
    async fn test_search_partial_failure() {
        let base = spawn(two_sources()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/search", base))
            .json(&json!({"query": "exercise", "sources": ["pubmed", "openalex"]}))
            .send()
            .await
            .expect("search");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("json");
        assert_eq!(body["totalUnique"], 1);
        assert_eq!(body["perSourceBreakdown"][1]["error"], "API error: 503 - HTTP 500");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let base = spawn(vec![ScriptedAdapter::failing(SourceId::Core, "down")]).await;
        let client = reqwest::Client::new();

        let missing = client
            .post(format!("{}/search", base))
            .json(&json!({"query": "  "}))
            .send()
            .await
            .expect("search");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let body: Value = missing.json().await.expect("json");
        assert_eq!(body["error"], "missing query");

        let failed = client
            .post(format!("{}/search", base))
            .json(&json!({"query": "q", "sources": ["core"]}))
            .send()
            .await
            .expect("search");
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
        let body: Value = failed.json().await.expect("json");
        assert_eq!(body["failures"][0]["source"], "core");
    }

    #[tokio::test]
    async fn test_export_sets_mime_type() {
        let base = spawn(two_sources()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/export?format=ris", base))
            .json(&json!({"query": "exercise", "sources": ["pubmed", "openalex"]}))
            .send()
            .await
            .expect("export");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/x-research-info-systems")
        );
        let body = response.text().await.expect("body");
        assert!(body.starts_with("TY  - JOUR\nTI  - Exercise and depression\n"));

        let bad = client
            .post(format!("{}/export?format=endnote", base))
            .json(&json!({"query": "exercise"}))
            .send()
            .await
            .expect("export");
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
