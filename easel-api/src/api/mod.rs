pub mod auth;
pub mod drawings;
pub mod health;
pub mod projects;
pub mod share;
pub mod thumbnails;

use crate::AppState;
use crate::errors::ApiError;
use chrono::{DateTime, SecondsFormat};

/// Delete the blobs among `hashes` that no drawing or thumbnail row still
/// references. Called after row deletions commit, so a crash in between
/// leaks at most an unreferenced blob.
pub(crate) async fn gc_blobs<I>(state: &AppState, hashes: I) -> Result<(), ApiError>
where
    I: IntoIterator<Item = String>,
{
    for hash in hashes {
        if state.drawings.blob_refcount(&hash)? == 0 {
            state.blobs.delete(&hash).await?;
        }
    }
    Ok(())
}

/// Row timestamps are unix seconds; responses carry RFC 3339.
pub(crate) fn rfc3339(secs: u64) -> String {
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Shared validation for project and drawing names.
pub(crate) fn validated_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Unprocessable("name cannot be empty".to_string()));
    }
    if name.chars().count() > 200 {
        return Err(ApiError::Unprocessable(
            "name cannot exceed 200 characters".to_string(),
        ));
    }
    Ok(name)
}
