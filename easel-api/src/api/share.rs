use crate::AppState;
use crate::api::rfc3339;
use crate::errors::ApiError;
use crate::extract::CurrentUser;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct ShareResponse {
    pub share_id: String,
    /// Path a client combines with its own origin to form the share URL.
    pub path: String,
}

/// The public view of a shared drawing: name and scene only, nothing about
/// the owning account or project.
#[derive(Serialize)]
pub struct SharedDrawingResponse {
    pub name: String,
    pub updated_at: String,
    pub payload: Value,
}

pub async fn create_share(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, ApiError> {
    let share_id = state
        .drawings
        .ensure_share_id(user.id, &id)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(ShareResponse {
        path: format!("/api/v1/shared/{share_id}"),
        share_id,
    }))
}

pub async fn revoke_share(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let drawing = state.drawings.find(user.id, &id)?.ok_or(ApiError::NotFound)?;
    state.drawings.clear_share_id(user.id, &id)?;

    // Remember the dead id so immediate re-probes of the old link skip the
    // database.
    if let Some(share_id) = drawing.share_id {
        state.share_cache.insert(&share_id);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Unauthenticated read. Possession of the share id is the entire
/// capability.
pub async fn get_shared(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<SharedDrawingResponse>, ApiError> {
    if state.share_cache.contains(&share_id) {
        return Err(ApiError::NotFound);
    }

    let Some(drawing) = state.drawings.find_by_share_id(&share_id)? else {
        state.share_cache.insert(&share_id);
        return Err(ApiError::NotFound);
    };

    let bytes = state.blobs.get(&drawing.payload_hash).await?;
    let payload = serde_json::from_slice(&bytes).map_err(|err| {
        tracing::error!("corrupt payload blob {}: {err}", drawing.payload_hash);
        ApiError::Internal
    })?;

    Ok(Json(SharedDrawingResponse {
        name: drawing.name,
        updated_at: rfc3339(drawing.updated_at),
        payload,
    }))
}
