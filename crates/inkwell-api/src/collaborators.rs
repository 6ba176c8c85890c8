use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use inkwell_types::api::{
    AddCollaboratorRequest, CapabilityResponse, Claims, CreateProjectRequest,
    CreateProjectResponse, UpdateLevelRequest,
};
use inkwell_types::models::Capability;

use crate::error::{Body, blocking};
use crate::state::AppState;

/// Create a project with the caller as its owner.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<CreateProjectRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let project_id = req.project_id.unwrap_or_else(Uuid::new_v4);
    let owner_id = claims.sub;

    blocking(&state, move |ws| ws.permissions.initialize(project_id, owner_id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project_id,
            owner_id,
        }),
    ))
}

pub async fn list_collaborators(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let collaborators = blocking(&state, move |ws| {
        ws.permissions.list_collaborators(project_id, claims.sub)
    })
    .await?;
    Ok(Json(collaborators))
}

pub async fn add_collaborator(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<AddCollaboratorRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let added = blocking(&state, move |ws| {
        ws.permissions
            .add_collaborator(project_id, claims.sub, req.user_id, req.level)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn update_level(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<UpdateLevelRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |ws| {
        ws.permissions
            .update_level(project_id, claims.sub, user_id, req.level)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |ws| {
        ws.permissions.remove_collaborator(project_id, claims.sub, user_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Whether the caller holds `capability` on the project.
pub async fn check_capability(
    State(state): State<AppState>,
    Path((project_id, capability)): Path<(Uuid, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let capability: Capability = capability.parse().map_err(|_| StatusCode::BAD_REQUEST)?;

    let allowed = blocking(&state, move |ws| {
        ws.permissions.has_capability(project_id, claims.sub, capability)
    })
    .await?;

    Ok(Json(CapabilityResponse {
        capability: capability.to_string(),
        allowed,
    }))
}
