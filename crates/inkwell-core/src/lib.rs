pub mod activity;
pub mod comments;
pub mod error;
pub mod files;
pub mod locks;
pub mod permissions;
pub mod presence;
mod rows;
pub mod versions;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use activity::ActivityLog;
pub use comments::CommentStore;
pub use error::{Result, StoreError};
pub use files::FileStore;
pub use permissions::{GeneratedShareLink, PermissionStore};
pub use presence::PresenceTracker;
pub use versions::{Restored, VersionStore};
pub use workspace::{Workspace, WorkspaceConfig};
