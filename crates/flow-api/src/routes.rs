//! Router, handlers and server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use dashmap::DashMap;
use eyre::{Context, Result};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use flow_data::links::links_response;
use flow_data::store::Store;
use flow_data::LinksResponse;

use crate::error::ApiError;
use crate::source::BlockSource;

/// Responses kept in memory before further blocks are served from SQLite only.
const HOT_CACHE_LIMIT: usize = 256;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    source: Arc<dyn BlockSource>,
    hot: Arc<DashMap<u64, Arc<LinksResponse>>>,
}

impl AppState {
    pub fn new(store: Arc<Store>, source: Arc<dyn BlockSource>) -> Self {
        Self {
            store,
            source,
            hot: Arc::new(DashMap::new()),
        }
    }
}

/// Build the service router with permissive CORS so a page on any origin
/// can call it.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/block/:block_number", get(get_block))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind block service to {addr}"))?;
    tracing::info!(%addr, "block service listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .wrap_err("block service terminated")?;
    Ok(())
}

#[tracing::instrument(skip(state))]
async fn get_block(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<LinksResponse>, ApiError> {
    let block_number: u64 = raw
        .parse()
        .map_err(|_| ApiError::InvalidBlockNumber(raw.clone()))?;

    let hot = state.hot.get(&block_number).map(|entry| entry.value().clone());
    if let Some(response) = hot {
        tracing::debug!(block_number, "served from memory");
        return Ok(Json((*response).clone()));
    }

    let store = state.store.clone();
    let cached = with_store(move || store.get_block(block_number)).await?;
    let payload = match cached {
        Some(payload) => {
            tracing::debug!(block_number, "served from block cache");
            payload
        }
        None => {
            let payload = state
                .source
                .block(block_number)
                .await
                .map_err(ApiError::Upstream)?
                .ok_or(ApiError::NotFound(block_number))?;
            let store = state.store.clone();
            let payload = with_store(move || {
                store.insert_block(block_number, &payload)?;
                Ok(payload)
            })
            .await?;
            tracing::info!(block_number, "fetched block from upstream");
            payload
        }
    };

    let response = links_response(&payload).map_err(ApiError::Upstream)?;
    if state.hot.len() < HOT_CACHE_LIMIT {
        state.hot.insert(block_number, Arc::new(response.clone()));
    }
    Ok(Json(response))
}

/// Run a SQLite call off the async workers.
async fn with_store<T, F>(call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ApiError::Store(eyre::eyre!("store task failed: {e}")))?
        .map_err(ApiError::Store)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
