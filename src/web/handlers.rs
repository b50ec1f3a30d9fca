use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::{CompetitionRecord, ScrapedCompetitionRow};
use super::middleware::AuthUser;
use super::{ApiResponse, AppState, HttpError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub search_input: Option<String>,
}

/// Resolve a reference number or tender URL into a tagged record,
/// deduplicating against the stores before any browser work.
pub async fn search_competition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ApiResponse<CompetitionRecord>>, HttpError> {
    let input = request
        .search_input
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            HttpError::bad_request("Please provide a reference number or a competition URL.")
        })?;

    info!(owner = %user.id, "Searching for competition");
    let record = state.resolver.resolve(&input, &user.id).await.map_err(|e| {
        error!(error = %e, "Competition search failed");
        HttpError::from(e)
    })?;

    Ok(Json(ApiResponse::success(record)))
}

pub async fn list_competitions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<CompetitionRecord>>>, HttpError> {
    let records = state
        .competitions
        .list(&user.id)
        .await
        .map_err(|e| HttpError::internal(format!("Failed to fetch competitions: {e}")))?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn list_scraped_competitions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<ScrapedCompetitionRow>>>, HttpError> {
    let rows = state
        .previews
        .list(&user.id)
        .await
        .map_err(|e| HttpError::internal(format!("Failed to fetch scraped competitions: {e}")))?;
    Ok(Json(ApiResponse::success(rows)))
}

/// Save a competition: insert when no id is supplied, update otherwise.
pub async fn save_competition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(record): Json<CompetitionRecord>,
) -> Result<Json<ApiResponse<CompetitionRecord>>, HttpError> {
    if record.reference_number.trim().is_empty() {
        return Err(HttpError::bad_request("Reference number is required"));
    }

    let updating = record.id.is_some();
    let saved = state
        .competitions
        .save(record, &user.id)
        .await
        .map_err(|e| HttpError::internal(format!("Failed to save competition: {e}")))?;

    info!(
        owner = %user.id,
        id = saved.id.as_deref().unwrap_or_default(),
        updating,
        "Competition saved"
    );
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn delete_competition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, HttpError> {
    state
        .competitions
        .delete(&id, &user.id)
        .await
        .map_err(|e| HttpError::internal(format!("Failed to delete competition: {e}")))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Competition deleted successfully."
    }))))
}
