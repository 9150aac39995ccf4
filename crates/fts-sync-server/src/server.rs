//! HTTP server implementation using Axum.

use crate::handler::{handle_full_text_search, handle_health};
use axum::{routing::get, Router};
use fts_sync::FtsSync;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub sync: Arc<FtsSync>,
}

/// Build the router. `api_prefix` is joined without leading or trailing slashes.
pub fn router(sync: Arc<FtsSync>, api_prefix: &str) -> Router {
    let state = Arc::new(AppState { sync });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let prefix = api_prefix.trim_matches('/');
    let search_route = if prefix.is_empty() {
        "/:collection/records/full-text-search".to_string()
    } else {
        format!("/{}/:collection/records/full-text-search", prefix)
    };

    Router::new()
        .route("/health", get(handle_health))
        .route(&search_route, get(handle_full_text_search))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    sync: Arc<FtsSync>,
    api_prefix: &str,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(sync, api_prefix);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
