use std::sync::Arc;

use inkwell_core::Workspace;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub workspace: Workspace,
    /// HMAC secret shared with the identity provider that issues tokens.
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(workspace: Workspace, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            workspace,
            jwt_secret: jwt_secret.into(),
        })
    }
}
