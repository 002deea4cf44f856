use crate::AppState;
use crate::api::{gc_blobs, rfc3339, validated_name};
use crate::errors::ApiError;
use crate::extract::CurrentUser;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use easel_store::types::Drawing;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
pub struct CreateDrawingBody {
    pub name: String,
    /// The scene: vector-graphics element data, opaque to the server beyond
    /// being a JSON object or array.
    pub payload: Value,
}

#[derive(Deserialize)]
pub struct UpdateDrawingBody {
    pub name: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Serialize)]
pub struct DrawingSummary {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub share_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Drawing> for DrawingSummary {
    fn from(drawing: Drawing) -> Self {
        DrawingSummary {
            id: drawing.id,
            project_id: drawing.project_id,
            name: drawing.name,
            share_id: drawing.share_id,
            created_at: rfc3339(drawing.created_at),
            updated_at: rfc3339(drawing.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct DrawingResponse {
    #[serde(flatten)]
    pub summary: DrawingSummary,
    pub payload: Value,
}

pub async fn list_drawings(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<DrawingSummary>>, ApiError> {
    let drawings = state
        .drawings
        .list(user.id, &project_id)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(drawings.into_iter().map(Into::into).collect()))
}

pub async fn create_drawing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    Json(body): Json<CreateDrawingBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validated_name(&body.name)?.to_string();
    let bytes = payload_bytes(&body.payload, state.max_payload_bytes)?;

    // Blob first, row second: a crash in between leaks an unreferenced blob,
    // never a dangling hash.
    let hash = state.blobs.put(bytes).await?;

    match state.drawings.create(user.id, &project_id, &name, &hash)? {
        Some(drawing) => Ok((StatusCode::CREATED, Json(DrawingSummary::from(drawing)))),
        None => {
            // Unknown project; drop the blob we just wrote unless some other
            // drawing already shares it.
            gc_blobs(&state, [hash]).await?;
            Err(ApiError::NotFound)
        }
    }
}

pub async fn get_drawing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DrawingResponse>, ApiError> {
    let drawing = state.drawings.find(user.id, &id)?.ok_or(ApiError::NotFound)?;

    let bytes = state.blobs.get(&drawing.payload_hash).await?;
    let payload = serde_json::from_slice(&bytes).map_err(|err| {
        tracing::error!("corrupt payload blob {}: {err}", drawing.payload_hash);
        ApiError::Internal
    })?;

    Ok(Json(DrawingResponse {
        summary: drawing.into(),
        payload,
    }))
}

pub async fn update_drawing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateDrawingBody>,
) -> Result<Json<DrawingSummary>, ApiError> {
    let name = match &body.name {
        Some(name) => Some(validated_name(name)?.to_string()),
        None => None,
    };

    let new_hash = match &body.payload {
        Some(payload) => {
            let bytes = payload_bytes(payload, state.max_payload_bytes)?;
            Some(state.blobs.put(bytes).await?)
        }
        None => None,
    };

    match state
        .drawings
        .update(user.id, &id, name.as_deref(), new_hash.as_deref())?
    {
        Some((drawing, replaced)) => {
            if let Some(old_hash) = replaced {
                gc_blobs(&state, [old_hash]).await?;
            }
            Ok(Json(drawing.into()))
        }
        None => {
            if let Some(hash) = new_hash {
                gc_blobs(&state, [hash]).await?;
            }
            Err(ApiError::NotFound)
        }
    }
}

pub async fn delete_drawing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.drawings.delete(user.id, &id)?.ok_or(ApiError::NotFound)?;

    let hashes = std::iter::once(deleted.payload_hash).chain(deleted.thumbnail_hash);
    gc_blobs(&state, hashes).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Serialize and bound a scene payload. Only JSON objects and arrays are
/// accepted; scalars are almost certainly client bugs.
fn payload_bytes(payload: &Value, max_bytes: usize) -> Result<Bytes, ApiError> {
    if !payload.is_object() && !payload.is_array() {
        return Err(ApiError::Unprocessable(
            "payload must be a JSON object or array".to_string(),
        ));
    }

    let bytes = serde_json::to_vec(payload).map_err(|_| ApiError::Internal)?;
    if bytes.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    Ok(Bytes::from(bytes))
}
