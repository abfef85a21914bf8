//! Catalog REST handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use snipkit_catalog::{
    Component, ComponentDraft, ComponentFilter, ComponentPatch, NewUser, ProfilePatch, Project,
    ProjectDraft, ProjectPatch, ProjectSummary, User,
};
use uuid::Uuid;

use super::Identity;
use crate::error::ApiError;
use crate::server::AppState;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type IdPath = Result<Path<Uuid>, PathRejection>;
type ExternalIdPath = Result<Path<String>, PathRejection>;

pub async fn create_project(
    State(state): State<AppState>,
    Identity(user): Identity,
    body: JsonBody<ProjectDraft>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(draft) = body?;
    let project = state.catalog.create_project(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Projects owned by the caller.
pub async fn my_projects(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.catalog.user_projects(&user).await?))
}

pub async fn public_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.catalog.public_projects().await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<Project>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.catalog.get_project(id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<ProjectPatch>,
) -> Result<Json<Project>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    Ok(Json(state.catalog.update_project(id, patch).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.catalog.delete_project(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn project_components(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<Vec<Component>>, ApiError> {
    let Path(id) = id?;
    state.catalog.get_project(id).await?;
    Ok(Json(state.catalog.project_components(id).await?))
}

/// Sanitizes the submitted code before anything is stored.
pub async fn create_component(
    State(state): State<AppState>,
    Identity(user): Identity,
    body: JsonBody<ComponentDraft>,
) -> Result<(StatusCode, Json<Component>), ApiError> {
    let Json(draft) = body?;
    let component = state.catalog.create_component(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

pub async fn public_components(
    State(state): State<AppState>,
    filter: Result<Query<ComponentFilter>, QueryRejection>,
) -> Result<Json<Vec<Component>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.catalog.public_components(filter).await?))
}

pub async fn get_component(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<Component>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.catalog.get_component(id).await?))
}

pub async fn update_component(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<ComponentPatch>,
) -> Result<Json<Component>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    Ok(Json(state.catalog.update_component(id, patch).await?))
}

pub async fn delete_component(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.catalog.delete_component(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_user(
    State(state): State<AppState>,
    body: JsonBody<NewUser>,
) -> Result<Json<User>, ApiError> {
    let Json(new_user) = body?;
    Ok(Json(state.catalog.create_user(new_user).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    external_id: ExternalIdPath,
) -> Result<Json<User>, ApiError> {
    let Path(external_id) = external_id?;
    Ok(Json(state.catalog.user_by_external_id(&external_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    external_id: ExternalIdPath,
    body: JsonBody<ProfilePatch>,
) -> Result<Json<User>, ApiError> {
    let Path(external_id) = external_id?;
    let Json(patch) = body?;
    Ok(Json(state.catalog.update_profile(&external_id, patch).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub following_id: String,
}

/// `POST /api/users/{external_id}/follow` with `{ "followingId": ... }`.
pub async fn follow_user(
    State(state): State<AppState>,
    external_id: ExternalIdPath,
    body: JsonBody<FollowRequest>,
) -> Result<StatusCode, ApiError> {
    let Path(follower) = external_id?;
    let Json(request) = body?;
    state
        .catalog
        .follow_user(&follower, &request.following_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
