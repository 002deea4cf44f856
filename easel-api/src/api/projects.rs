use crate::AppState;
use crate::api::{gc_blobs, rfc3339, validated_name};
use crate::errors::ApiError;
use crate::extract::CurrentUser;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use easel_store::types::Project;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ProjectBody {
    pub name: String,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        ProjectResponse {
            id: project.id,
            name: project.name,
            created_at: rfc3339(project.created_at),
            updated_at: rfc3339(project.updated_at),
        }
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let projects = state.projects.list(user.id)?;
    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ProjectBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validated_name(&body.name)?;
    let project = state.projects.create(user.id, name)?;
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

pub async fn get_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = state.projects.find(user.id, &id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(project.into()))
}

pub async fn rename_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<ProjectBody>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let name = validated_name(&body.name)?;
    let project = state
        .projects
        .rename(user.id, &id, name)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(project.into()))
}

pub async fn delete_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let hashes = state
        .projects
        .delete(user.id, &id)?
        .ok_or(ApiError::NotFound)?;
    gc_blobs(&state, hashes).await?;
    Ok(StatusCode::NO_CONTENT)
}
