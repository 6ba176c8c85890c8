use thiserror::Error;
use uuid::Uuid;

/// Outcome of a failed store operation. Every variant is recoverable and
/// leaves storage untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("user {actor} is not permitted: requires {required}")]
    PermissionDenied { actor: Uuid, required: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("storage unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
