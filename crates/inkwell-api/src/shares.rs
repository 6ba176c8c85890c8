use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use inkwell_types::api::{Claims, RedeemResponse, ShareRequest, ShareResponse};

use crate::error::{Body, blocking};
use crate::state::AppState;

pub async fn create_share_link(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Body(req): Body<ShareRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let generated = blocking(&state, move |ws| {
        ws.permissions
            .generate_share_link(project_id, claims.sub, req.expires_at)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            token: generated.token,
            url: generated.url,
            expires_at: generated.link.expires_at,
        }),
    ))
}

/// Redeem a share token. The store only resolves it; expiry is checked
/// here, at the moment of redemption.
pub async fn redeem_share_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let link = blocking(&state, move |ws| ws.permissions.resolve_share_link(&token)).await?;

    if link.is_expired(Utc::now()) {
        info!(
            "{} presented an expired share link for project {}",
            claims.sub, link.project_id
        );
        return Err(StatusCode::GONE);
    }

    Ok(Json(RedeemResponse {
        project_id: link.project_id,
        expires_at: link.expires_at,
    }))
}
