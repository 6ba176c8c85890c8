use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use inkwell_core::{StoreError, Workspace};

use crate::state::AppState;

/// HTTP status for a store outcome.
pub fn status(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        StoreError::InvalidState(_) | StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Unavailable(e) => {
            error!("storage failure: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run a store call off the async runtime.
pub async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Workspace) -> inkwell_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.workspace))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(status)
}

/// JSON body whose rejections all surface as 400.
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = StatusCode;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => {
                debug!("rejected request body: {}", rejection.body_text());
                Err(StatusCode::BAD_REQUEST)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn outcomes_map_to_statuses() {
        assert_eq!(status(StoreError::NotFound("file".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::PermissionDenied {
                actor: Uuid::new_v4(),
                required: "write".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(StoreError::InvalidState("owner".into())), StatusCode::CONFLICT);
        assert_eq!(status(StoreError::AlreadyExists("user".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(StoreError::Unavailable(anyhow::anyhow!("disk gone"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
