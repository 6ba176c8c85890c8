//! Shared fixture for store tests.

use std::sync::Arc;

use uuid::Uuid;

use inkwell_db::Database;
use inkwell_types::models::CapabilityLevel;

use crate::workspace::{Workspace, WorkspaceConfig};

pub(crate) struct Harness {
    pub ws: Workspace,
    pub project: Uuid,
    pub owner: Uuid,
}

impl Harness {
    /// A fresh in-memory workspace with one initialized project.
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ws = Workspace::new(db, WorkspaceConfig::default());
        let project = Uuid::new_v4();
        let owner = Uuid::new_v4();
        ws.permissions.initialize(project, owner).unwrap();
        Self { ws, project, owner }
    }

    /// Add a new collaborator at `level` and return their id.
    pub fn member(&self, level: CapabilityLevel) -> Uuid {
        let user = Uuid::new_v4();
        self.ws
            .permissions
            .add_collaborator(self.project, self.owner, user, level)
            .unwrap();
        user
    }
}
