//! Per-project capability map: the single source of truth for who may do
//! what. Every other store authorizes through [`require`] on each call,
//! inside its own transaction, so a decision is never cached across calls.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use inkwell_db::Database;
use inkwell_db::models::{CollaboratorRow, ShareLinkRow};
use inkwell_db::queries;
use inkwell_types::models::{
    ActivityType, Capability, CapabilityLevel, Collaborator, NewActivity, ShareLink,
};

use crate::activity;
use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;
use crate::rows;

/// Random bytes in a share token before encoding.
const SHARE_TOKEN_BYTES: usize = 32;

/// Build the outcome for a refused call and leave a trace of it on the
/// `audit` target. Denials are not written to the activity log.
pub(crate) fn denied(project_id: Uuid, actor: Uuid, required: &str) -> StoreError {
    warn!(
        target: "audit",
        project = %project_id,
        actor = %actor,
        required,
        "permission denied"
    );
    StoreError::PermissionDenied {
        actor,
        required: required.to_string(),
    }
}

pub(crate) fn level_in(
    conn: &Connection,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Option<CapabilityLevel>> {
    queries::get_level(conn, &project_id.to_string(), &user_id.to_string())?
        .as_deref()
        .map(rows::parse_level)
        .transpose()
}

/// Fail with `PermissionDenied` unless `actor` currently holds `capability`.
pub(crate) fn require(
    conn: &Connection,
    project_id: Uuid,
    actor: Uuid,
    capability: Capability,
) -> Result<CapabilityLevel> {
    match level_in(conn, project_id, actor)? {
        Some(level) if level.allows(capability) => Ok(level),
        _ => Err(denied(project_id, actor, capability.as_str())),
    }
}

fn ensure_project(conn: &Connection, project_id: Uuid) -> Result<()> {
    if queries::project_exists(conn, &project_id.to_string())? {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("project {}", project_id)))
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly minted share link. `token` is only ever returned here.
#[derive(Debug, Clone)]
pub struct GeneratedShareLink {
    pub token: String,
    pub url: String,
    pub link: ShareLink,
}

pub struct PermissionStore {
    db: Arc<Database>,
    locks: KeyedLocks<Uuid>,
    share_base_url: String,
}

impl PermissionStore {
    pub fn new(db: Arc<Database>, share_base_url: impl Into<String>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
            share_base_url: share_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the project's map with `owner_id` as its only OWNER.
    pub fn initialize(&self, project_id: Uuid, owner_id: Uuid) -> Result<()> {
        self.locks.with(project_id, || {
            self.db.transaction(|conn| {
                if queries::project_exists(conn, &project_id.to_string())? {
                    return Err(StoreError::AlreadyExists(format!("project {}", project_id)));
                }

                queries::insert_collaborator(
                    conn,
                    &CollaboratorRow {
                        project_id: project_id.to_string(),
                        user_id: owner_id.to_string(),
                        level: CapabilityLevel::Owner.as_str().to_string(),
                        added_at: rows::stamp(rows::now()),
                    },
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::ProjectCreated, project_id, owner_id).details(
                        json!({ "action": "created", "resource_type": "project" }),
                    ),
                )?;
                Ok(())
            })
        })?;

        info!("Project {} initialized with owner {}", project_id, owner_id);
        Ok(())
    }

    /// False when the user is not a collaborator or their level lacks the
    /// capability.
    pub fn has_capability(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        capability: Capability,
    ) -> Result<bool> {
        Ok(self
            .level_of(project_id, user_id)?
            .is_some_and(|level| level.allows(capability)))
    }

    /// Like `has_capability`, but a missing capability is `PermissionDenied`.
    pub fn authorize(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        capability: Capability,
    ) -> Result<CapabilityLevel> {
        self.db
            .transaction(|conn| require(conn, project_id, user_id, capability))
    }

    pub fn level_of(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<CapabilityLevel>> {
        self.db
            .get_level(&project_id.to_string(), &user_id.to_string())?
            .as_deref()
            .map(rows::parse_level)
            .transpose()
    }

    pub fn list_collaborators(&self, project_id: Uuid, actor: Uuid) -> Result<Vec<Collaborator>> {
        self.db.transaction(|conn| {
            ensure_project(conn, project_id)?;
            require(conn, project_id, actor, Capability::Read)?;
            queries::list_collaborators(conn, &project_id.to_string())?
                .into_iter()
                .map(rows::collaborator)
                .collect()
        })
    }

    pub fn add_collaborator(
        &self,
        project_id: Uuid,
        actor: Uuid,
        target: Uuid,
        level: CapabilityLevel,
    ) -> Result<Collaborator> {
        let added = self.locks.with(project_id, || {
            self.db.transaction(|conn| {
                ensure_project(conn, project_id)?;
                require(conn, project_id, actor, Capability::ManagePermissions)?;

                if level == CapabilityLevel::Owner {
                    return Err(StoreError::InvalidState(
                        "a project has exactly one owner".into(),
                    ));
                }
                if level_in(conn, project_id, target)?.is_some() {
                    return Err(StoreError::AlreadyExists(format!(
                        "collaborator {} on project {}",
                        target, project_id
                    )));
                }

                let added_at = rows::now();
                queries::insert_collaborator(
                    conn,
                    &CollaboratorRow {
                        project_id: project_id.to_string(),
                        user_id: target.to_string(),
                        level: level.as_str().to_string(),
                        added_at: rows::stamp(added_at),
                    },
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::CollaboratorAdded, project_id, actor)
                        .target(target)
                        .details(json!({
                            "action": "added",
                            "resource_type": "collaborator",
                            "permission_level": level,
                        })),
                )?;

                Ok(Collaborator {
                    project_id,
                    user_id: target,
                    level,
                    description: level.description().to_string(),
                    added_at,
                })
            })
        })?;

        info!("{} added {} to project {} as {}", actor, target, project_id, level);
        Ok(added)
    }

    /// Change a non-owner's level. Targeting the owner, or promoting anyone
    /// to owner, is `InvalidState` whatever the actor's own level.
    pub fn update_level(
        &self,
        project_id: Uuid,
        actor: Uuid,
        target: Uuid,
        new_level: CapabilityLevel,
    ) -> Result<()> {
        self.locks.with(project_id, || {
            self.db.transaction(|conn| {
                ensure_project(conn, project_id)?;
                let current = level_in(conn, project_id, target)?;

                if current == Some(CapabilityLevel::Owner) {
                    return Err(StoreError::InvalidState(
                        "the owner's level cannot be changed".into(),
                    ));
                }
                if new_level == CapabilityLevel::Owner {
                    return Err(StoreError::InvalidState(
                        "a project has exactly one owner".into(),
                    ));
                }
                require(conn, project_id, actor, Capability::ManagePermissions)?;
                if current.is_none() {
                    return Err(StoreError::NotFound(format!(
                        "collaborator {} on project {}",
                        target, project_id
                    )));
                }

                queries::update_collaborator_level(
                    conn,
                    &project_id.to_string(),
                    &target.to_string(),
                    new_level.as_str(),
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::PermissionUpdated, project_id, actor)
                        .target(target)
                        .details(json!({
                            "action": "updated",
                            "resource_type": "permission",
                            "new_permission_level": new_level,
                        })),
                )?;
                Ok(())
            })
        })?;

        info!("{} set {} to {} on project {}", actor, target, new_level, project_id);
        Ok(())
    }

    /// Remove a non-owner. The owner can never be removed.
    pub fn remove_collaborator(&self, project_id: Uuid, actor: Uuid, target: Uuid) -> Result<()> {
        self.locks.with(project_id, || {
            self.db.transaction(|conn| {
                ensure_project(conn, project_id)?;
                let current = level_in(conn, project_id, target)?;

                if current == Some(CapabilityLevel::Owner) {
                    return Err(StoreError::InvalidState("the owner cannot be removed".into()));
                }
                require(conn, project_id, actor, Capability::ManagePermissions)?;
                if current.is_none() {
                    return Err(StoreError::NotFound(format!(
                        "collaborator {} on project {}",
                        target, project_id
                    )));
                }

                queries::delete_collaborator(conn, &project_id.to_string(), &target.to_string())?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::CollaboratorRemoved, project_id, actor)
                        .target(target)
                        .details(json!({ "action": "removed", "resource_type": "collaborator" })),
                )?;
                Ok(())
            })
        })?;

        info!("{} removed {} from project {}", actor, target, project_id);
        Ok(())
    }

    /// Mint an unguessable token bound to the project and expiry. Only the
    /// token's digest is stored; whoever redeems it must recheck expiry.
    pub fn generate_share_link(
        &self,
        project_id: Uuid,
        actor: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<GeneratedShareLink> {
        let mut bytes = [0u8; SHARE_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let link = self.db.transaction::<_, _, StoreError>(|conn| {
            ensure_project(conn, project_id)?;
            require(conn, project_id, actor, Capability::Share)?;

            let link = ShareLink {
                project_id,
                created_by: actor,
                created_at: rows::now(),
                expires_at,
            };
            queries::insert_share_link(
                conn,
                &ShareLinkRow {
                    token_hash: token_digest(&token),
                    project_id: project_id.to_string(),
                    created_by: actor.to_string(),
                    created_at: rows::stamp(link.created_at),
                    expires_at: expires_at.map(rows::stamp),
                },
            )?;

            activity::append(
                conn,
                NewActivity::new(ActivityType::ProjectShared, project_id, actor).details(json!({
                    "action": "shared",
                    "resource_type": "project",
                    "expiration": expires_at,
                })),
            )?;
            Ok(link)
        })?;

        info!("{} shared project {} (expires {:?})", actor, project_id, expires_at);
        Ok(GeneratedShareLink {
            url: format!("{}/shared/{}", self.share_base_url, token),
            token,
            link,
        })
    }

    /// Look up what a token was issued for. Expiry is not checked here.
    pub fn resolve_share_link(&self, token: &str) -> Result<ShareLink> {
        let row = self
            .db
            .get_share_link(&token_digest(token))?
            .ok_or_else(|| StoreError::NotFound("share link".into()))?;
        rows::share_link(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;

    struct Fixture {
        store: PermissionStore,
        log: ActivityLog,
        project: Uuid,
        owner: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = PermissionStore::new(db.clone(), "https://docs.example/");
        let log = ActivityLog::new(db, 100);
        let project = Uuid::new_v4();
        let owner = Uuid::new_v4();
        store.initialize(project, owner).unwrap();
        Fixture { store, log, project, owner }
    }

    fn owners(f: &Fixture) -> usize {
        f.store
            .list_collaborators(f.project, f.owner)
            .unwrap()
            .iter()
            .filter(|c| c.level == CapabilityLevel::Owner)
            .count()
    }

    #[test]
    fn initialize_twice_fails() {
        let f = fixture();
        let err = f.store.initialize(f.project, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(f.store.level_of(f.project, f.owner).unwrap(), Some(CapabilityLevel::Owner));
    }

    #[test]
    fn editor_gets_write_but_not_manage() {
        let f = fixture();
        let editor = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, editor, CapabilityLevel::Editor)
            .unwrap();

        assert!(f.store.has_capability(f.project, editor, Capability::Write).unwrap());
        assert!(!f.store.has_capability(f.project, editor, Capability::ManagePermissions).unwrap());
        assert!(!f.store.has_capability(f.project, Uuid::new_v4(), Capability::Read).unwrap());
        assert!(!f.store.has_capability(Uuid::new_v4(), f.owner, Capability::Read).unwrap());

        assert_eq!(
            f.store.authorize(f.project, editor, Capability::Write).unwrap(),
            CapabilityLevel::Editor
        );
        let err = f.store.authorize(f.project, editor, Capability::Share).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
    }

    #[test]
    fn editor_cannot_add_and_map_is_unchanged() {
        let f = fixture();
        let editor = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, editor, CapabilityLevel::Editor)
            .unwrap();
        let before = f.log.query_by_project(f.project, 100).unwrap().len();

        let err = f
            .store
            .add_collaborator(f.project, editor, viewer, CapabilityLevel::Viewer)
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));

        assert_eq!(f.store.level_of(f.project, viewer).unwrap(), None);
        assert_eq!(f.store.list_collaborators(f.project, f.owner).unwrap().len(), 2);
        assert_eq!(f.log.query_by_project(f.project, 100).unwrap().len(), before);
    }

    #[test]
    fn duplicate_and_owner_adds_are_rejected() {
        let f = fixture();
        let user = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, user, CapabilityLevel::Viewer)
            .unwrap();

        let dup = f
            .store
            .add_collaborator(f.project, f.owner, user, CapabilityLevel::Editor)
            .unwrap_err();
        assert!(matches!(dup, StoreError::AlreadyExists(_)));

        let second_owner = f
            .store
            .add_collaborator(f.project, f.owner, Uuid::new_v4(), CapabilityLevel::Owner)
            .unwrap_err();
        assert!(matches!(second_owner, StoreError::InvalidState(_)));
        assert_eq!(owners(&f), 1);
    }

    #[test]
    fn owner_is_never_demoted_or_removed() {
        let f = fixture();
        let editor = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, editor, CapabilityLevel::Editor)
            .unwrap();

        // Regardless of who asks.
        for actor in [f.owner, editor, Uuid::new_v4()] {
            let err = f
                .store
                .update_level(f.project, actor, f.owner, CapabilityLevel::Viewer)
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidState(_)));

            let err = f.store.remove_collaborator(f.project, actor, f.owner).unwrap_err();
            assert!(matches!(err, StoreError::InvalidState(_)));
        }

        let err = f
            .store
            .update_level(f.project, f.owner, editor, CapabilityLevel::Owner)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
        assert_eq!(owners(&f), 1);
        assert_eq!(f.store.level_of(f.project, f.owner).unwrap(), Some(CapabilityLevel::Owner));
    }

    #[test]
    fn exactly_one_owner_across_mixed_operations() {
        let f = fixture();
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for user in &users {
            let _ = f.store.add_collaborator(f.project, f.owner, *user, CapabilityLevel::Viewer);
            let _ = f.store.update_level(f.project, f.owner, *user, CapabilityLevel::Editor);
            let _ = f.store.update_level(f.project, *user, f.owner, CapabilityLevel::Editor);
            let _ = f.store.add_collaborator(f.project, *user, f.owner, CapabilityLevel::Owner);
            assert_eq!(owners(&f), 1);
        }
        let _ = f.store.remove_collaborator(f.project, f.owner, users[0]);
        let _ = f.store.remove_collaborator(f.project, users[1], f.owner);
        assert_eq!(owners(&f), 1);
        assert_eq!(f.store.list_collaborators(f.project, f.owner).unwrap().len(), 4);
    }

    #[test]
    fn update_and_remove_emit_activity() {
        let f = fixture();
        let user = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, user, CapabilityLevel::Viewer)
            .unwrap();
        f.store
            .update_level(f.project, f.owner, user, CapabilityLevel::Editor)
            .unwrap();
        assert!(f.store.has_capability(f.project, user, Capability::Write).unwrap());
        f.store.remove_collaborator(f.project, f.owner, user).unwrap();
        assert_eq!(f.store.level_of(f.project, user).unwrap(), None);

        let kinds: Vec<ActivityType> = f
            .log
            .query_by_project(f.project, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ActivityType::CollaboratorRemoved,
                ActivityType::PermissionUpdated,
                ActivityType::CollaboratorAdded,
                ActivityType::ProjectCreated,
            ]
        );

        let err = f.store.remove_collaborator(f.project, f.owner, user).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn missing_project_is_not_found() {
        let f = fixture();
        let err = f
            .store
            .add_collaborator(Uuid::new_v4(), f.owner, Uuid::new_v4(), CapabilityLevel::Viewer)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn share_links_resolve_by_token_only() {
        let f = fixture();
        let expiry = rows::now() + chrono::Duration::hours(1);
        let generated = f
            .store
            .generate_share_link(f.project, f.owner, Some(expiry))
            .unwrap();

        assert!(generated.url.starts_with("https://docs.example/shared/"));
        assert!(generated.url.ends_with(&generated.token));
        assert!(generated.token.len() >= 40);

        let link = f.store.resolve_share_link(&generated.token).unwrap();
        assert_eq!(link.project_id, f.project);
        assert_eq!(link.expires_at, Some(expiry));
        assert!(!link.is_expired(rows::now()));
        assert!(link.is_expired(expiry + chrono::Duration::seconds(1)));

        let other = f.store.generate_share_link(f.project, f.owner, None).unwrap();
        assert_ne!(other.token, generated.token);

        let err = f.store.resolve_share_link("not-a-token").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn editors_cannot_share() {
        let f = fixture();
        let editor = Uuid::new_v4();
        f.store
            .add_collaborator(f.project, f.owner, editor, CapabilityLevel::Editor)
            .unwrap();
        let err = f.store.generate_share_link(f.project, editor, None).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
    }
}
