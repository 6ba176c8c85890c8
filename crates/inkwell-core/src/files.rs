//! Live file contents. Writes are last-write-wins; each overwrite first
//! snapshots the previous content into the version history.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use inkwell_db::Database;
use inkwell_db::models::FileRow;
use inkwell_db::queries;
use inkwell_types::models::{
    ActivityType, Capability, FileRecord, NewActivity, Version, VersionMetadata,
};

use crate::activity;
use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;
use crate::permissions::require;
use crate::rows;
use crate::versions::{file_in, snapshot_in};

pub struct FileStore {
    db: Arc<Database>,
    locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
}

impl FileStore {
    pub fn new(db: Arc<Database>, locks: Arc<KeyedLocks<(Uuid, Uuid)>>) -> Self {
        Self { db, locks }
    }

    pub fn create_file(
        &self,
        project_id: Uuid,
        actor: Uuid,
        path: &str,
        content: &str,
    ) -> Result<FileRecord> {
        let file_id = Uuid::new_v4();

        let file = self.locks.with((project_id, file_id), || {
            self.db.transaction(|conn| {
                require(conn, project_id, actor, Capability::Write)?;
                if queries::file_path_exists(conn, &project_id.to_string(), path)? {
                    return Err(StoreError::AlreadyExists(format!("file '{}'", path)));
                }

                let now = rows::now();
                let file = FileRecord {
                    id: file_id,
                    project_id,
                    path: path.to_string(),
                    content: content.to_string(),
                    created_at: now,
                    created_by: actor,
                    updated_at: now,
                    updated_by: actor,
                };
                queries::insert_file(
                    conn,
                    &FileRow {
                        id: file_id.to_string(),
                        project_id: project_id.to_string(),
                        path: file.path.clone(),
                        content: file.content.clone(),
                        created_at: rows::stamp(now),
                        created_by: actor.to_string(),
                        updated_at: rows::stamp(now),
                        updated_by: actor.to_string(),
                    },
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::FileCreated, project_id, actor)
                        .file(file_id)
                        .details(json!({
                            "action": "created",
                            "resource_type": "file",
                            "file_path": path,
                        })),
                )?;
                Ok(file)
            })
        })?;

        info!("{} created {} ({}) in project {}", actor, file.path, file.id, project_id);
        Ok(file)
    }

    pub fn read_file(&self, project_id: Uuid, file_id: Uuid, actor: Uuid) -> Result<FileRecord> {
        self.db.transaction(|conn| {
            let file = file_in(conn, project_id, file_id)?;
            require(conn, project_id, actor, Capability::Read)?;
            Ok(file)
        })
    }

    pub fn list_files(&self, project_id: Uuid, actor: Uuid) -> Result<Vec<FileRecord>> {
        self.db.transaction(|conn| {
            require(conn, project_id, actor, Capability::Read)?;
            queries::list_files(conn, &project_id.to_string())?
                .into_iter()
                .map(rows::file)
                .collect()
        })
    }

    /// Overwrite a file's content. Returns the new file and the snapshot
    /// holding what it replaced.
    pub fn update_file(
        &self,
        project_id: Uuid,
        file_id: Uuid,
        actor: Uuid,
        content: &str,
    ) -> Result<(FileRecord, Version)> {
        let (file, snapshot) = self.locks.with((project_id, file_id), || {
            self.db.transaction(|conn| {
                let file = file_in(conn, project_id, file_id)?;
                require(conn, project_id, actor, Capability::Write)?;

                let snapshot = snapshot_in(
                    conn,
                    file_id,
                    &file.content,
                    VersionMetadata {
                        project_id: Some(project_id),
                        path: Some(file.path.clone()),
                        actor_id: Some(actor),
                        restoring: None,
                    },
                )?;

                let updated_at = rows::now();
                queries::update_file_content(
                    conn,
                    &file_id.to_string(),
                    content,
                    &rows::stamp(updated_at),
                    &actor.to_string(),
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::FileUpdated, project_id, actor)
                        .file(file_id)
                        .details(json!({
                            "action": "updated",
                            "resource_type": "file",
                            "file_path": file.path,
                            "snapshot_version_id": snapshot.version_id,
                        })),
                )?;

                let updated = FileRecord {
                    content: content.to_string(),
                    updated_at,
                    updated_by: actor,
                    ..file
                };
                Ok::<_, StoreError>((updated, snapshot))
            })
        })?;

        info!(
            "{} updated file {} (previous content kept as v{})",
            actor, file_id, snapshot.version_id
        );
        Ok((file, snapshot))
    }

    /// Remove the live file and its comments. Its version history stays in
    /// place.
    pub fn delete_file(&self, project_id: Uuid, file_id: Uuid, actor: Uuid) -> Result<FileRecord> {
        let file = self.locks.with((project_id, file_id), || {
            self.db.transaction(|conn| {
                let file = file_in(conn, project_id, file_id)?;
                require(conn, project_id, actor, Capability::Delete)?;

                let comments_removed = queries::delete_file_comments(conn, &file_id.to_string())?;
                queries::delete_file(conn, &file_id.to_string())?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::FileDeleted, project_id, actor)
                        .file(file_id)
                        .details(json!({
                            "action": "deleted",
                            "resource_type": "file",
                            "file_path": file.path,
                            "comments_removed": comments_removed,
                        })),
                )?;
                Ok::<_, StoreError>(file)
            })
        })?;

        info!("{} deleted file {} from project {}", actor, file_id, project_id);
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use inkwell_types::models::CapabilityLevel;

    #[test]
    fn update_snapshots_previous_content() {
        let h = Harness::new();
        let file = h.ws.files.create_file(h.project, h.owner, "draft/intro.md", "A").unwrap();

        let (updated, snapshot) = h.ws.files.update_file(h.project, file.id, h.owner, "B").unwrap();
        assert_eq!(updated.content, "B");
        assert_eq!(snapshot.version_id, 1);
        assert_eq!(snapshot.content, "A");
        assert_eq!(snapshot.metadata.path.as_deref(), Some("draft/intro.md"));

        let (_, snapshot) = h.ws.files.update_file(h.project, file.id, h.owner, "C").unwrap();
        assert_eq!(snapshot.version_id, 2);
        assert_eq!(h.ws.files.read_file(h.project, file.id, h.owner).unwrap().content, "C");
    }

    #[test]
    fn viewers_cannot_write_and_editors_cannot_delete() {
        let h = Harness::new();
        let viewer = h.member(CapabilityLevel::Viewer);
        let editor = h.member(CapabilityLevel::Editor);
        let file = h.ws.files.create_file(h.project, editor, "notes.md", "x").unwrap();

        let err = h.ws.files.update_file(h.project, file.id, viewer, "y").unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
        let err = h.ws.files.create_file(h.project, viewer, "other.md", "").unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
        let err = h.ws.files.delete_file(h.project, file.id, editor).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));

        // Denied calls leave no snapshot behind.
        assert_eq!(h.ws.versions.list_versions(file.id, viewer).unwrap().len(), 1);
        assert_eq!(h.ws.files.read_file(h.project, file.id, viewer).unwrap().content, "x");
    }

    #[test]
    fn paths_are_unique_per_project() {
        let h = Harness::new();
        h.ws.files.create_file(h.project, h.owner, "a.md", "").unwrap();
        let err = h.ws.files.create_file(h.project, h.owner, "a.md", "").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let paths: Vec<String> = h
            .ws
            .files
            .list_files(h.project, h.owner)
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["a.md".to_string()]);
    }

    #[test]
    fn files_are_scoped_to_their_project() {
        let h = Harness::new();
        let file = h.ws.files.create_file(h.project, h.owner, "a.md", "").unwrap();

        let elsewhere = Uuid::new_v4();
        h.ws.permissions.initialize(elsewhere, h.owner).unwrap();
        let err = h.ws.files.read_file(elsewhere, file.id, h.owner).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn delete_keeps_history_and_is_audited() {
        let h = Harness::new();
        let file = h.ws.files.create_file(h.project, h.owner, "a.md", "one").unwrap();
        h.ws.files.update_file(h.project, file.id, h.owner, "two").unwrap();
        h.ws.files.delete_file(h.project, file.id, h.owner).unwrap();

        let err = h.ws.files.read_file(h.project, file.id, h.owner).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let kept = h.ws.db().with_conn(|c| queries::list_versions(c, &file.id.to_string())).unwrap();
        assert_eq!(kept.len(), 1);

        let latest = &h.ws.activity.query_by_project(h.project, 1).unwrap()[0];
        assert_eq!(latest.kind, ActivityType::FileDeleted);
        assert_eq!(latest.file_id, Some(file.id));
    }
}
