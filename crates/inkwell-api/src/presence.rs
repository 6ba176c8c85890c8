use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use inkwell_types::api::{Claims, PresenceResponse};

use crate::error::blocking;
use crate::state::AppState;

/// Everyone with the file open, the caller included if listed.
pub async fn active_users(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |ws| ws.files.read_file(project_id, file_id, claims.sub)).await?;

    let active_users = state.workspace.presence.active_users(project_id, file_id).await;
    Ok(Json(PresenceResponse { active_users }))
}

/// Heartbeat: list the caller on the file for another timeout period.
pub async fn mark_active(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;
    blocking(&state, move |ws| ws.files.read_file(project_id, file_id, user_id)).await?;

    let presence = &state.workspace.presence;
    presence.mark_active(project_id, file_id, user_id).await;
    let active_users = presence.active_users(project_id, file_id).await;
    Ok(Json(PresenceResponse { active_users }))
}

/// Leaving is always allowed, even after access was revoked.
pub async fn mark_inactive(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    state
        .workspace
        .presence
        .mark_inactive(project_id, file_id, claims.sub)
        .await;
    StatusCode::NO_CONTENT
}
