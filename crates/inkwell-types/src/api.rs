use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CapabilityLevel, FileRecord};

// -- JWT Claims --

/// Identity issued by the external Identity Provider. `sub` is the acting
/// user for every request; the service never authenticates credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Projects & collaborators --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProjectRequest {
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub project_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCollaboratorRequest {
    pub user_id: Uuid,
    pub level: CapabilityLevel,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLevelRequest {
    pub level: CapabilityLevel,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CapabilityResponse {
    pub capability: String,
    pub allowed: bool,
}

// -- Sharing --

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareRequest {
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub token: String,
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub project_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

// -- Files --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFileRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFileRequest {
    pub content: String,
}

/// A file as returned to a viewer, with who else has it open.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    #[serde(flatten)]
    pub file: FileRecord,
    pub active_users: Vec<Uuid>,
}

// -- Comments --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteCommentResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub added: bool,
}

// -- Presence --

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub active_users: Vec<Uuid>,
}
