//! Append-only content history per file. Snapshots are never edited,
//! deleted, or renumbered; a restore adds one more.

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use inkwell_db::Database;
use inkwell_db::models::VersionRow;
use inkwell_db::queries;
use inkwell_types::models::{
    ActivityType, Capability, FileRecord, NewActivity, Version, VersionEntry, VersionMetadata,
};

use crate::activity;
use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;
use crate::permissions::require;
use crate::rows;

/// Record `content` as the next version of `file_id`.
///
/// The id is computed and inserted in the caller's transaction, and the
/// `(file_id, version_id)` key is unique, so concurrent writers can never
/// share an id.
pub(crate) fn snapshot_in(
    conn: &Connection,
    file_id: Uuid,
    content: &str,
    metadata: VersionMetadata,
) -> Result<Version> {
    let file_key = file_id.to_string();
    let version_id = queries::next_version_id(conn, &file_key)?;
    let timestamp = rows::now();
    let encoded = serde_json::to_string(&metadata).map_err(anyhow::Error::from)?;

    queries::insert_version(
        conn,
        &VersionRow {
            file_id: file_key,
            version_id,
            content: content.to_string(),
            metadata: encoded,
            created_at: rows::stamp(timestamp),
        },
    )?;

    Ok(Version {
        file_id,
        version_id: u64::try_from(version_id).map_err(anyhow::Error::from)?,
        content: content.to_string(),
        timestamp,
        metadata,
    })
}

/// The live file, provided it belongs to `project_id`.
pub(crate) fn file_in(conn: &Connection, project_id: Uuid, file_id: Uuid) -> Result<FileRecord> {
    match queries::get_file(conn, &file_id.to_string())? {
        Some(row) => {
            let file = rows::file(row)?;
            if file.project_id == project_id {
                Ok(file)
            } else {
                Err(StoreError::NotFound(format!("file {}", file_id)))
            }
        }
        None => Err(StoreError::NotFound(format!("file {}", file_id))),
    }
}

/// Result of a restore: the snapshot that preserved the overwritten
/// content, and the file as it now reads.
#[derive(Debug, Clone)]
pub struct Restored {
    pub preserved: Version,
    pub file: FileRecord,
}

pub struct VersionStore {
    db: Arc<Database>,
    locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
}

impl VersionStore {
    pub fn new(db: Arc<Database>, locks: Arc<KeyedLocks<(Uuid, Uuid)>>) -> Self {
        Self { db, locks }
    }

    /// Project a live file belongs to, for choosing its lock.
    fn project_of(&self, file_id: Uuid) -> Result<Uuid> {
        let row = self
            .db
            .with_conn(|conn| queries::get_file(conn, &file_id.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("file {}", file_id)))?;
        rows::parse_id(&row.project_id)
    }

    /// Capture `content` as the next version of a file, ahead of a live
    /// overwrite. Not idempotent: each call appends.
    pub fn snapshot(
        &self,
        file_id: Uuid,
        content: &str,
        metadata: VersionMetadata,
    ) -> Result<Version> {
        let project_id = self.project_of(file_id)?;
        self.locks.with((project_id, file_id), || {
            self.db
                .transaction(|conn| snapshot_in(conn, file_id, content, metadata))
        })
    }

    /// Every snapshot newest first, then the live content as `Current`.
    pub fn list_versions(&self, file_id: Uuid, actor: Uuid) -> Result<Vec<VersionEntry>> {
        let project_id = self.project_of(file_id)?;
        self.db.transaction(|conn| {
            let file = file_in(conn, project_id, file_id)?;
            require(conn, project_id, actor, Capability::Read)?;

            let mut entries = queries::list_versions(conn, &file_id.to_string())?
                .into_iter()
                .map(|row| rows::version(row).map(VersionEntry::Snapshot))
                .collect::<Result<Vec<_>>>()?;

            entries.push(VersionEntry::Current {
                file_id,
                content: file.content,
                updated_at: file.updated_at,
                updated_by: file.updated_by,
            });
            Ok(entries)
        })
    }

    pub fn get_version(&self, file_id: Uuid, version_id: u64, actor: Uuid) -> Result<Version> {
        let project_id = self.project_of(file_id)?;
        self.db.transaction(|conn| {
            file_in(conn, project_id, file_id)?;
            require(conn, project_id, actor, Capability::Read)?;
            version_in(conn, file_id, version_id)
        })
    }

    /// Bring back an earlier version. The current live content is
    /// snapshotted first, so the restore itself can be undone.
    pub fn restore(&self, file_id: Uuid, version_id: u64, actor: Uuid) -> Result<Restored> {
        let project_id = self.project_of(file_id)?;

        let restored = self.locks.with((project_id, file_id), || {
            self.db.transaction(|conn| {
                let file = file_in(conn, project_id, file_id)?;
                require(conn, project_id, actor, Capability::Write)?;
                let target = version_in(conn, file_id, version_id)?;

                let preserved = snapshot_in(
                    conn,
                    file_id,
                    &file.content,
                    VersionMetadata {
                        project_id: Some(project_id),
                        path: Some(file.path.clone()),
                        actor_id: Some(actor),
                        restoring: Some(version_id),
                    },
                )?;

                let updated_at = rows::now();
                queries::update_file_content(
                    conn,
                    &file_id.to_string(),
                    &target.content,
                    &rows::stamp(updated_at),
                    &actor.to_string(),
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::VersionRestored, project_id, actor)
                        .file(file_id)
                        .details(json!({
                            "action": "restored",
                            "resource_type": "version",
                            "version_id": version_id,
                            "preserved_as": preserved.version_id,
                        })),
                )?;

                Ok::<_, StoreError>(Restored {
                    preserved,
                    file: FileRecord {
                        content: target.content,
                        updated_at,
                        updated_by: actor,
                        ..file
                    },
                })
            })
        })?;

        info!(
            "{} restored file {} to v{} (previous content kept as v{})",
            actor, file_id, version_id, restored.preserved.version_id
        );
        Ok(restored)
    }
}

fn version_in(conn: &Connection, file_id: Uuid, version_id: u64) -> Result<Version> {
    let key = i64::try_from(version_id)
        .map_err(|_| StoreError::NotFound(format!("version {} of file {}", version_id, file_id)))?;
    match queries::get_version(conn, &file_id.to_string(), key)? {
        Some(row) => rows::version(row),
        None => Err(StoreError::NotFound(format!(
            "version {} of file {}",
            version_id, file_id
        ))),
    }
}
