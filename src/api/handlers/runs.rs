use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::ingestion::fetcher::{self, IngestReport};
use crate::resolution::sync::{self, SyncMode, SyncReport};
use crate::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// POST /api/runs/ingest — one ingestion pass over the trade feed.
///
/// Row-level drops never fail the run; a hard upstream failure comes back
/// as success=false with the error description.
pub async fn ingest(State(state): State<AppState>) -> Json<ApiResponse<IngestReport>> {
    let notifier = state.notifier.clone();
    match fetcher::run_ingestion(
        &state.data_client,
        &state.db,
        notifier.as_deref(),
        &state.config,
    )
    .await
    {
        Ok(report) => Json(ApiResponse {
            success: true,
            data: Some(report),
            error: None,
        }),
        Err(e) => Json(ApiResponse {
            success: false,
            data: None,
            error: Some(e.to_string()),
        }),
    }
}

#[derive(Deserialize)]
pub struct ResolutionRunRequest {
    pub mode: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// POST /api/runs/resolution — one resolution pass in the requested mode.
pub async fn resolution(
    State(state): State<AppState>,
    Json(req): Json<ResolutionRunRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, AppError> {
    let Some(mode) = SyncMode::parse(&req.mode, req.target.as_deref()) else {
        return Err(AppError::BadRequest(format!(
            "unknown resolution mode: {}",
            req.mode
        )));
    };

    match sync::run_resolution_sync(&state.gamma_client, &state.db, mode, &state.config).await {
        Ok(report) => Ok(Json(ApiResponse {
            success: true,
            data: Some(report),
            error: None,
        })),
        Err(e) => Ok(Json(ApiResponse {
            success: false,
            data: None,
            error: Some(e.to_string()),
        })),
    }
}
