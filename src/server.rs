//! Read-only HTTP endpoint listing blobs by tag.
//!
//! Routes:
//! - `GET /blob/listBlobsByTag`: `[{"container": .., "blob": ..}, ..]`
//! - `GET /health`

use std::io;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{BlobVisionError, ServerConfig, TagFilter, TagLister, TaggedBlob};

pub const LIST_BY_TAG_PATH: &str = "/blob/listBlobsByTag";
pub const DEFAULT_TAG_NAME: &str = "customModifiedDate";
pub const DEFAULT_TAG_VALUE: &str = "2025-01-05";

/// Filter served by the listing endpoint.
pub fn default_tag_filter() -> TagFilter {
    TagFilter::less_or_equal(DEFAULT_TAG_NAME, DEFAULT_TAG_VALUE)
}

#[derive(Clone)]
struct AppState<L> {
    lister: L,
    filter: TagFilter,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

struct ApiError(BlobVisionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.kind().as_str(),
            message: self.0.to_string(),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn list_blobs_by_tag<L: TagLister>(
    State(state): State<AppState<L>>,
) -> Result<Json<Vec<TaggedBlob>>, ApiError> {
    match state.lister.list_by_tags(&state.filter).await {
        Ok(blobs) => {
            tracing::info!(filter = %state.filter, matched = blobs.len(), "listed blobs by tag");
            Ok(Json(blobs))
        }
        Err(err) => {
            tracing::error!(filter = %state.filter, error = %err, "blob tag listing failed");
            Err(ApiError(err))
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Builds the router serving `filter` from `lister`.
pub fn router<L: TagLister>(lister: L, filter: TagFilter) -> Router {
    Router::new()
        .route(LIST_BY_TAG_PATH, get(list_blobs_by_tag::<L>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { lister, filter })
}

/// Binds `config` and serves `router` until Ctrl-C.
pub async fn serve(router: Router, config: &ServerConfig) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.address()).await?;
    tracing::info!("server listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            tracing::error!("server encountered an error: {err:?}");
            err
        })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
