use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use inkwell_types::api::{Claims, CreateFileRequest, FileResponse, UpdateFileRequest};
use inkwell_types::models::FileRecord;

use crate::error::{Body, blocking};
use crate::state::AppState;

/// Mark the caller as viewing the file and attach everyone viewing it.
async fn with_presence(state: &AppState, file: FileRecord, user_id: Uuid) -> FileResponse {
    let presence = &state.workspace.presence;
    presence.mark_active(file.project_id, file.id, user_id).await;
    let active_users = presence.active_users(file.project_id, file.id).await;
    FileResponse { file, active_users }
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let files = blocking(&state, move |ws| ws.files.list_files(project_id, claims.sub)).await?;
    Ok(Json(files))
}

pub async fn create_file(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<CreateFileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.path.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let file = blocking(&state, move |ws| {
        ws.files
            .create_file(project_id, claims.sub, &req.path, &req.content)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn read_file(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;
    let file = blocking(&state, move |ws| ws.files.read_file(project_id, file_id, user_id)).await?;
    Ok(Json(with_presence(&state, file, user_id).await))
}

pub async fn update_file(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<UpdateFileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;
    let (file, _snapshot) = blocking(&state, move |ws| {
        ws.files
            .update_file(project_id, file_id, user_id, &req.content)
    })
    .await?;
    Ok(Json(with_presence(&state, file, user_id).await))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |ws| ws.files.delete_file(project_id, file_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Versions --

pub async fn list_versions(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let versions = blocking(&state, move |ws| {
        ws.files.read_file(project_id, file_id, claims.sub)?;
        ws.versions.list_versions(file_id, claims.sub)
    })
    .await?;
    Ok(Json(versions))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path((project_id, file_id, version_id)): Path<(Uuid, Uuid, u64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let version = blocking(&state, move |ws| {
        ws.files.read_file(project_id, file_id, claims.sub)?;
        ws.versions.get_version(file_id, version_id, claims.sub)
    })
    .await?;
    Ok(Json(version))
}

pub async fn restore_version(
    State(state): State<AppState>,
    Path((project_id, file_id, version_id)): Path<(Uuid, Uuid, u64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;
    let restored = blocking(&state, move |ws| {
        ws.files.read_file(project_id, file_id, user_id)?;
        ws.versions.restore(file_id, version_id, user_id)
    })
    .await?;
    Ok(Json(with_presence(&state, restored.file, user_id).await))
}
