use std::sync::Arc;
use std::time::Duration;

use inkwell_db::Database;

use crate::activity::{self, ActivityLog};
use crate::comments::CommentStore;
use crate::files::FileStore;
use crate::locks::KeyedLocks;
use crate::permissions::PermissionStore;
use crate::presence::{self, PresenceTracker};
use crate::versions::VersionStore;

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Prefix for generated share URLs, e.g. `https://docs.example.com`.
    pub share_base_url: String,
    pub activity_retention: u32,
    pub presence_timeout: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            share_base_url: "http://localhost:3000".into(),
            activity_retention: activity::DEFAULT_RETENTION,
            presence_timeout: presence::DEFAULT_TIMEOUT,
        }
    }
}

/// Every store, built over one shared database.
pub struct Workspace {
    db: Arc<Database>,
    pub permissions: PermissionStore,
    pub files: FileStore,
    pub versions: VersionStore,
    pub comments: CommentStore,
    pub activity: Arc<ActivityLog>,
    pub presence: PresenceTracker,
}

impl Workspace {
    pub fn new(db: Arc<Database>, config: WorkspaceConfig) -> Self {
        // Live writes and restores on the same file share one lock.
        let file_locks = Arc::new(KeyedLocks::new());

        Self {
            permissions: PermissionStore::new(db.clone(), config.share_base_url),
            files: FileStore::new(db.clone(), file_locks.clone()),
            versions: VersionStore::new(db.clone(), file_locks),
            comments: CommentStore::new(db.clone()),
            activity: Arc::new(ActivityLog::new(db.clone(), config.activity_retention)),
            presence: PresenceTracker::new(config.presence_timeout),
            db,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}
