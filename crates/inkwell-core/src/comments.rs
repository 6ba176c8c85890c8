//! Threaded discussion anchored to a file. Threads are one level deep: a
//! reply always hangs off a top-level comment.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use inkwell_db::Database;
use inkwell_db::models::CommentRow;
use inkwell_db::queries;
use inkwell_types::models::{
    ActivityType, Capability, Comment, CommentThread, NewActivity, ReactionGroup,
};

use crate::activity;
use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;
use crate::permissions::{denied, require};
use crate::rows;
use crate::versions::file_in;

fn comment_in(conn: &Connection, comment_id: Uuid) -> Result<Comment> {
    match queries::get_comment(conn, &comment_id.to_string())? {
        Some(row) => rows::comment(row),
        None => Err(StoreError::NotFound(format!("comment {}", comment_id))),
    }
}

/// A comment whose file is still live. Comments on a deleted file are
/// `NotFound` like the file itself.
fn live_comment_in(conn: &Connection, comment_id: Uuid) -> Result<Comment> {
    let comment = comment_in(conn, comment_id)?;
    file_in(conn, comment.project_id, comment.file_id)?;
    Ok(comment)
}

/// Group reaction rows by emoji, in order of each emoji's first use.
fn group_reactions(
    conn: &Connection,
    project_id: Uuid,
    file_id: Uuid,
) -> Result<HashMap<Uuid, Vec<ReactionGroup>>> {
    let mut grouped: HashMap<Uuid, Vec<ReactionGroup>> = HashMap::new();

    for row in queries::list_reactions(conn, &project_id.to_string(), &file_id.to_string())? {
        let comment_id = rows::parse_id(&row.comment_id)?;
        let user_id = rows::parse_id(&row.user_id)?;
        let groups = grouped.entry(comment_id).or_default();
        match groups.iter_mut().find(|g| g.emoji == row.emoji) {
            Some(group) => {
                group.count += 1;
                group.user_ids.push(user_id);
            }
            None => groups.push(ReactionGroup {
                emoji: row.emoji,
                count: 1,
                user_ids: vec![user_id],
            }),
        }
    }
    Ok(grouped)
}

pub struct CommentStore {
    db: Arc<Database>,
    locks: KeyedLocks<(Uuid, Uuid)>,
}

impl CommentStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
        }
    }

    /// The lock key for an existing comment. Missing comments are
    /// `NotFound` before any authorization happens.
    fn key_of(&self, comment_id: Uuid) -> Result<(Uuid, Uuid)> {
        let comment = self.db.transaction(|conn| comment_in(conn, comment_id))?;
        Ok((comment.project_id, comment.file_id))
    }

    pub fn add_comment(
        &self,
        project_id: Uuid,
        file_id: Uuid,
        actor: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let comment = self.locks.with((project_id, file_id), || {
            self.db.transaction(|conn| {
                file_in(conn, project_id, file_id)?;
                require(conn, project_id, actor, Capability::Comment)?;

                if let Some(parent_id) = parent_id {
                    let parent = match comment_in(conn, parent_id) {
                        Ok(parent) if parent.file_id == file_id => parent,
                        Ok(_) | Err(StoreError::NotFound(_)) => {
                            return Err(StoreError::NotFound(format!(
                                "comment {} on file {}",
                                parent_id, file_id
                            )));
                        }
                        Err(e) => return Err(e),
                    };
                    if parent.is_reply() {
                        return Err(StoreError::InvalidState(
                            "replies cannot have replies".into(),
                        ));
                    }
                }

                let comment = Comment {
                    id: Uuid::new_v4(),
                    project_id,
                    file_id,
                    parent_id,
                    author_id: actor,
                    content: content.to_string(),
                    created_at: rows::now(),
                    updated_at: None,
                    is_resolved: false,
                    resolved_by: None,
                    resolved_at: None,
                    reactions: Vec::new(),
                };
                queries::insert_comment(
                    conn,
                    &CommentRow {
                        id: comment.id.to_string(),
                        project_id: project_id.to_string(),
                        file_id: file_id.to_string(),
                        parent_id: parent_id.map(|id| id.to_string()),
                        author_id: actor.to_string(),
                        content: comment.content.clone(),
                        created_at: rows::stamp(comment.created_at),
                        updated_at: None,
                        is_resolved: false,
                        resolved_by: None,
                        resolved_at: None,
                    },
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::CommentAdded, project_id, actor)
                        .file(file_id)
                        .details(json!({
                            "action": "added",
                            "resource_type": "comment",
                            "comment_id": comment.id,
                            "is_reply": parent_id.is_some(),
                        })),
                )?;
                Ok(comment)
            })
        })?;

        info!("{} commented on file {} ({})", actor, file_id, comment.id);
        Ok(comment)
    }

    /// Replace a comment's text. Only its author may do this, whatever
    /// level anyone else holds, and only while still able to comment.
    pub fn edit_comment(&self, comment_id: Uuid, actor: Uuid, content: &str) -> Result<Comment> {
        let key = self.key_of(comment_id)?;

        let comment = self.locks.with(key, || {
            self.db.transaction(|conn| {
                let comment = live_comment_in(conn, comment_id)?;
                require(conn, comment.project_id, actor, Capability::Comment)?;
                if comment.author_id != actor {
                    return Err(denied(comment.project_id, actor, "authorship"));
                }

                let updated_at = rows::now();
                queries::update_comment_content(
                    conn,
                    &comment_id.to_string(),
                    content,
                    &rows::stamp(updated_at),
                )?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::CommentUpdated, comment.project_id, actor)
                        .file(comment.file_id)
                        .details(json!({
                            "action": "updated",
                            "resource_type": "comment",
                            "comment_id": comment_id,
                        })),
                )?;

                Ok(Comment {
                    content: content.to_string(),
                    updated_at: Some(updated_at),
                    ..comment
                })
            })
        })?;

        debug!("{} edited comment {}", actor, comment_id);
        Ok(comment)
    }

    /// Delete a comment and its direct replies. Allowed for its author while
    /// they can still comment, or for anyone who manages permissions.
    /// Returns how many comments were removed.
    pub fn delete_comment(&self, comment_id: Uuid, actor: Uuid) -> Result<usize> {
        let key = self.key_of(comment_id)?;

        let deleted = self.locks.with(key, || {
            self.db.transaction(|conn| {
                let comment = live_comment_in(conn, comment_id)?;
                let required = if comment.author_id == actor {
                    Capability::Comment
                } else {
                    Capability::ManagePermissions
                };
                require(conn, comment.project_id, actor, required)?;

                let deleted = queries::delete_comment_thread(conn, &comment_id.to_string())?;

                activity::append(
                    conn,
                    NewActivity::new(ActivityType::CommentDeleted, comment.project_id, actor)
                        .file(comment.file_id)
                        .details(json!({
                            "action": "deleted",
                            "resource_type": "comment",
                            "comment_id": comment_id,
                            "deleted": deleted,
                        })),
                )?;
                Ok::<_, StoreError>(deleted)
            })
        })?;

        info!("{} deleted comment {} ({} removed)", actor, comment_id, deleted);
        Ok(deleted)
    }

    /// Flip a comment between resolved and open.
    pub fn toggle_resolution(&self, comment_id: Uuid, actor: Uuid) -> Result<Comment> {
        let key = self.key_of(comment_id)?;

        let comment = self.locks.with(key, || {
            self.db.transaction(|conn| {
                let comment = live_comment_in(conn, comment_id)?;
                require(conn, comment.project_id, actor, Capability::Comment)?;

                let resolving = !comment.is_resolved;
                let (resolved_by, resolved_at) = if resolving {
                    (Some(actor), Some(rows::now()))
                } else {
                    (None, None)
                };
                queries::set_comment_resolution(
                    conn,
                    &comment_id.to_string(),
                    resolving,
                    resolved_by.map(|id| id.to_string()).as_deref(),
                    resolved_at.map(rows::stamp).as_deref(),
                )?;

                let (kind, action) = if resolving {
                    (ActivityType::CommentResolved, "resolved")
                } else {
                    (ActivityType::CommentReopened, "reopened")
                };
                activity::append(
                    conn,
                    NewActivity::new(kind, comment.project_id, actor)
                        .file(comment.file_id)
                        .details(json!({
                            "action": action,
                            "resource_type": "comment",
                            "comment_id": comment_id,
                        })),
                )?;

                Ok::<_, StoreError>(Comment {
                    is_resolved: resolving,
                    resolved_by,
                    resolved_at,
                    ..comment
                })
            })
        })?;

        debug!(
            "{} {} comment {}",
            actor,
            if comment.is_resolved { "resolved" } else { "reopened" },
            comment_id
        );
        Ok(comment)
    }

    /// Add the actor's `emoji` reaction, or take it back if already there.
    /// Returns true when the reaction was added.
    pub fn toggle_reaction(&self, comment_id: Uuid, actor: Uuid, emoji: &str) -> Result<bool> {
        let key = self.key_of(comment_id)?;

        self.locks.with(key, || {
            self.db.transaction(|conn| {
                let comment = live_comment_in(conn, comment_id)?;
                require(conn, comment.project_id, actor, Capability::Comment)?;
                let added = queries::toggle_reaction(
                    conn,
                    &comment_id.to_string(),
                    &actor.to_string(),
                    emoji,
                    &rows::stamp(rows::now()),
                )?;
                Ok(added)
            })
        })
    }

    /// Top-level comments oldest first, each with its replies in order.
    /// Resolved threads are left out unless `include_resolved` is set.
    pub fn list_comments(
        &self,
        project_id: Uuid,
        file_id: Uuid,
        actor: Uuid,
        include_resolved: bool,
    ) -> Result<Vec<CommentThread>> {
        self.db.transaction(|conn| {
            file_in(conn, project_id, file_id)?;
            require(conn, project_id, actor, Capability::Read)?;

            let mut reactions = group_reactions(conn, project_id, file_id)?;
            let mut threads: Vec<CommentThread> = Vec::new();
            let mut replies: Vec<Comment> = Vec::new();

            for row in queries::list_comments(conn, &project_id.to_string(), &file_id.to_string())? {
                let mut comment = rows::comment(row)?;
                comment.reactions = reactions.remove(&comment.id).unwrap_or_default();
                if comment.is_reply() {
                    replies.push(comment);
                } else {
                    threads.push(CommentThread {
                        comment,
                        replies: Vec::new(),
                    });
                }
            }

            for reply in replies {
                if let Some(thread) = threads
                    .iter_mut()
                    .find(|t| Some(t.comment.id) == reply.parent_id)
                {
                    thread.replies.push(reply);
                }
            }

            if !include_resolved {
                threads.retain(|t| !t.comment.is_resolved);
            }
            Ok(threads)
        })
    }
}
