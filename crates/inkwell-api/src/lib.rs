pub mod activity;
pub mod collaborators;
pub mod comments;
pub mod error;
pub mod files;
pub mod middleware;
pub mod presence;
pub mod shares;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Every route: `/health` is open, the rest need a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/projects", post(collaborators::create_project))
        .route(
            "/projects/{project_id}/collaborators",
            get(collaborators::list_collaborators).post(collaborators::add_collaborator),
        )
        .route(
            "/projects/{project_id}/collaborators/{user_id}",
            axum::routing::patch(collaborators::update_level)
                .delete(collaborators::remove_collaborator),
        )
        .route(
            "/projects/{project_id}/capabilities/{capability}",
            get(collaborators::check_capability),
        )
        .route("/projects/{project_id}/share", post(shares::create_share_link))
        .route("/shared/{token}", get(shares::redeem_share_link))
        .route(
            "/projects/{project_id}/files",
            get(files::list_files).post(files::create_file),
        )
        .route(
            "/projects/{project_id}/files/{file_id}",
            get(files::read_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route(
            "/projects/{project_id}/files/{file_id}/versions",
            get(files::list_versions),
        )
        .route(
            "/projects/{project_id}/files/{file_id}/versions/{version_id}",
            get(files::get_version),
        )
        .route(
            "/projects/{project_id}/files/{file_id}/versions/{version_id}/restore",
            post(files::restore_version),
        )
        .route(
            "/projects/{project_id}/files/{file_id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/comments/{comment_id}",
            axum::routing::patch(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/comments/{comment_id}/resolve", post(comments::toggle_resolution))
        .route("/comments/{comment_id}/reactions", post(comments::toggle_reaction))
        .route("/projects/{project_id}/activity", get(activity::project_activity))
        .route(
            "/projects/{project_id}/files/{file_id}/presence",
            get(presence::active_users)
                .post(presence::mark_active)
                .delete(presence::mark_inactive),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().route("/health", get(health)).merge(protected)
}

async fn health() -> &'static str {
    "ok"
}
