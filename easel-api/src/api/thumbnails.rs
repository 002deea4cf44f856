use crate::AppState;
use crate::api::gc_blobs;
use crate::errors::ApiError;
use crate::extract::CurrentUser;
use crate::metrics_defs::THUMBNAILS_EVICTED;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use easel_store::types::unix_now_millis;
use shared::counter;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

pub async fn put_thumbnail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let drawing = state.drawings.find(user.id, &id)?.ok_or(ApiError::NotFound)?;

    if !body.starts_with(&PNG_MAGIC) {
        return Err(ApiError::Unprocessable(
            "thumbnail must be a PNG image".to_string(),
        ));
    }
    // An image larger than the whole budget would be admitted and then
    // starve every other entry; reject it outright.
    if body.len() as u64 > state.thumbnails.max_total_bytes() {
        return Err(ApiError::PayloadTooLarge);
    }

    let size_bytes = body.len() as u64;
    let hash = state.blobs.put(body).await?;
    let outcome = state
        .thumbnails
        .upsert(&drawing.id, &hash, size_bytes, unix_now_millis())?;

    if !outcome.evicted.is_empty() {
        counter!(THUMBNAILS_EVICTED).increment(outcome.evicted.len() as u64);
    }

    // Blobs orphaned by replacement or eviction; the refcount check inside
    // gc_blobs keeps any hash the fresh entry shares.
    let hashes = outcome
        .replaced_hash
        .into_iter()
        .chain(outcome.evicted.into_iter().map(|e| e.blob_hash));
    gc_blobs(&state, hashes).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_thumbnail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.drawings.find(user.id, &id)?.ok_or(ApiError::NotFound)?;

    let record = state
        .thumbnails
        .get(&id, unix_now_millis())?
        .ok_or(ApiError::NotFound)?;
    let bytes = state.blobs.get(&record.blob_hash).await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
