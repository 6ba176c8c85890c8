use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use inkwell_core::activity::DEFAULT_QUERY_LIMIT;
use inkwell_types::api::Claims;
use inkwell_types::models::Capability;

use crate::error::blocking;
use crate::state::AppState;

const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

/// A project's audit trail, newest first. Needs read on the project.
/// `limit` must be positive and is capped at `MAX_LIMIT`.
pub async fn project_activity(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ActivityQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if query.limit == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let limit = query.limit.min(MAX_LIMIT);

    let records = blocking(&state, move |ws| {
        ws.permissions.authorize(project_id, claims.sub, Capability::Read)?;
        ws.activity.query_by_project(project_id, limit)
    })
    .await?;
    Ok(Json(records))
}
