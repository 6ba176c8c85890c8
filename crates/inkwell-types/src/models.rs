use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Capabilities --

/// An atomic permission checked before every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Comment,
    Share,
    ManagePermissions,
    Delete,
    Export,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Comment => "comment",
            Self::Share => "share",
            Self::ManagePermissions => "manage_permissions",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "comment" => Ok(Self::Comment),
            "share" => Ok(Self::Share),
            "manage_permissions" => Ok(Self::ManagePermissions),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Named bundle of capabilities held by a collaborator.
///
/// Each level lists its capabilities explicitly; nothing is inherited
/// from a "lower" level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityLevel {
    Owner,
    Editor,
    Viewer,
}

const OWNER_CAPABILITIES: &[Capability] = &[
    Capability::Read,
    Capability::Write,
    Capability::Comment,
    Capability::Share,
    Capability::ManagePermissions,
    Capability::Delete,
    Capability::Export,
];

const EDITOR_CAPABILITIES: &[Capability] = &[
    Capability::Read,
    Capability::Write,
    Capability::Comment,
    Capability::Export,
];

const VIEWER_CAPABILITIES: &[Capability] =
    &[Capability::Read, Capability::Comment, Capability::Export];

impl CapabilityLevel {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Owner => OWNER_CAPABILITIES,
            Self::Editor => EDITOR_CAPABILITIES,
            Self::Viewer => VIEWER_CAPABILITIES,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Owner => "Can edit, share, and manage permissions",
            Self::Editor => "Can edit and comment on documents",
            Self::Viewer => "Can view and comment on documents",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a stored or requested name matches no enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

// -- Collaborators --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub level: CapabilityLevel,
    pub description: String,
    pub added_at: DateTime<Utc>,
}

/// A share link as resolved from its token. The token itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub project_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

// -- Files & versions --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub path: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

/// Context captured alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub project_id: Option<Uuid>,
    pub path: Option<String>,
    pub actor_id: Option<Uuid>,
    /// Set when the snapshot was taken because a restore overwrote the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restoring: Option<u64>,
}

/// Immutable snapshot of a file's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub file_id: Uuid,
    pub version_id: u64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: VersionMetadata,
}

/// One row of a file's history listing: either a stored snapshot or the
/// live content that has not been saved to history yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionEntry {
    Snapshot(Version),
    Current {
        file_id: Uuid,
        content: String,
        updated_at: DateTime<Utc>,
        updated_by: Uuid,
    },
}

impl VersionEntry {
    pub fn content(&self) -> &str {
        match self {
            Self::Snapshot(v) => &v.content,
            Self::Current { content, .. } => content,
        }
    }

    pub fn version_id(&self) -> Option<u64> {
        match self {
            Self::Snapshot(v) => Some(v.version_id),
            Self::Current { .. } => None,
        }
    }
}

// -- Comments --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub file_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Vec<ReactionGroup>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A top-level comment with its replies in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

// -- Activity --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ProjectCreated,
    CollaboratorAdded,
    PermissionUpdated,
    CollaboratorRemoved,
    ProjectShared,
    FileCreated,
    FileUpdated,
    FileDeleted,
    VersionRestored,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    CommentResolved,
    CommentReopened,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::CollaboratorAdded => "collaborator_added",
            Self::PermissionUpdated => "permission_updated",
            Self::CollaboratorRemoved => "collaborator_removed",
            Self::ProjectShared => "project_shared",
            Self::FileCreated => "file_created",
            Self::FileUpdated => "file_updated",
            Self::FileDeleted => "file_deleted",
            Self::VersionRestored => "version_restored",
            Self::CommentAdded => "comment_added",
            Self::CommentUpdated => "comment_updated",
            Self::CommentDeleted => "comment_deleted",
            Self::CommentResolved => "comment_resolved",
            Self::CommentReopened => "comment_reopened",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "project_created" => Self::ProjectCreated,
            "collaborator_added" => Self::CollaboratorAdded,
            "permission_updated" => Self::PermissionUpdated,
            "collaborator_removed" => Self::CollaboratorRemoved,
            "project_shared" => Self::ProjectShared,
            "file_created" => Self::FileCreated,
            "file_updated" => Self::FileUpdated,
            "file_deleted" => Self::FileDeleted,
            "version_restored" => Self::VersionRestored,
            "comment_added" => Self::CommentAdded,
            "comment_updated" => Self::CommentUpdated,
            "comment_deleted" => Self::CommentDeleted,
            "comment_resolved" => Self::CommentResolved,
            "comment_reopened" => Self::CommentReopened,
            other => return Err(UnknownVariant(other.to_string())),
        };
        Ok(kind)
    }
}

/// A stored audit entry. `seq` is the append order within this database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub seq: i64,
    pub project_id: Uuid,
    pub file_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub target_user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// An audit entry about to be appended. A missing timestamp is filled in
/// at append time.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub project_id: Uuid,
    pub file_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub target_user_id: Option<Uuid>,
    pub kind: ActivityType,
    pub timestamp: Option<DateTime<Utc>>,
    pub details: serde_json::Value,
}

impl NewActivity {
    pub fn new(kind: ActivityType, project_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            project_id,
            file_id: None,
            actor_id,
            target_user_id: None,
            kind,
            timestamp: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn file(mut self, file_id: Uuid) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn target(mut self, user_id: Uuid) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
