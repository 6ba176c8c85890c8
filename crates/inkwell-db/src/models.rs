/// Database row types. Each maps directly to an SQLite row.
/// Distinct from inkwell-types models to keep the DB layer independent.
/// Ids and timestamps are stored as text.

pub struct CollaboratorRow {
    pub project_id: String,
    pub user_id: String,
    pub level: String,
    pub added_at: String,
}

pub struct ShareLinkRow {
    pub token_hash: String,
    pub project_id: String,
    pub created_by: String,
    pub created_at: String,
    pub expires_at: Option<String>,
}

pub struct FileRow {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub content: String,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

pub struct VersionRow {
    pub file_id: String,
    pub version_id: i64,
    pub content: String,
    /// JSON-encoded snapshot metadata.
    pub metadata: String,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub project_id: String,
    pub file_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub is_resolved: bool,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<String>,
}

pub struct ReactionRow {
    pub comment_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}

pub struct ActivityRow {
    /// Assigned by SQLite on insert; ignored by `insert_activity`.
    pub seq: i64,
    pub project_id: String,
    pub file_id: Option<String>,
    pub actor_id: String,
    pub target_user_id: Option<String>,
    pub kind: String,
    pub timestamp: String,
    /// JSON-encoded details object.
    pub details: String,
}
