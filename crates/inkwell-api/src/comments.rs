use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use inkwell_types::api::{
    AddCommentRequest, Claims, DeleteCommentResponse, EditCommentRequest, ToggleReactionRequest,
    ToggleReactionResponse,
};

use crate::error::{Body, blocking};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    #[serde(default = "default_include_resolved")]
    pub include_resolved: bool,
}

fn default_include_resolved() -> bool {
    true
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<CommentQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let threads = blocking(&state, move |ws| {
        ws.comments
            .list_comments(project_id, file_id, claims.sub, query.include_resolved)
    })
    .await?;
    Ok(Json(threads))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<AddCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let comment = blocking(&state, move |ws| {
        ws.comments
            .add_comment(project_id, file_id, claims.sub, &req.content, req.parent_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<EditCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let comment = blocking(&state, move |ws| {
        ws.comments.edit_comment(comment_id, claims.sub, &req.content)
    })
    .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let deleted =
        blocking(&state, move |ws| ws.comments.delete_comment(comment_id, claims.sub)).await?;
    Ok(Json(DeleteCommentResponse { deleted }))
}

pub async fn toggle_resolution(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let comment =
        blocking(&state, move |ws| ws.comments.toggle_resolution(comment_id, claims.sub)).await?;
    Ok(Json(comment))
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<ToggleReactionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() || emoji.chars().count() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let added = blocking(&state, move |ws| {
        ws.comments.toggle_reaction(comment_id, claims.sub, &emoji)
    })
    .await?;
    Ok(Json(ToggleReactionResponse { added }))
}
