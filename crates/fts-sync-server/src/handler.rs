//! HTTP request handlers.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fts_sync::{FtsError, SearchOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Query string of the search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    pub data: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: json!({}),
        }
    }
}

impl From<FtsError> for ApiError {
    fn from(err: FtsError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Full-text search over one collection.
pub async fn handle_full_text_search(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let raw = params.search.unwrap_or_default();
    debug!("Search request on {}: {:?}", collection, raw);

    let sync = Arc::clone(&state.sync);
    let target = collection.clone();
    let outcome = tokio::task::spawn_blocking(move || sync.search(&target, &raw))
        .await
        .map_err(|e| {
            error!("Search task for {} panicked: {}", collection, e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Search task failed")
        })?;

    match outcome {
        Ok(SearchOutcome::NoContent) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(SearchOutcome::Matches(records)) => Ok(Json(records).into_response()),
        Err(e) => {
            if e.status_code() == 404 {
                warn!("Search on unknown collection {}: {}", collection, e);
            } else {
                error!("Search on {} failed: {}", collection, e);
            }
            Err(e.into())
        }
    }
}
