//! Row-level queries. Free functions take a `&Connection` so stores can
//! compose several of them inside one `Database::transaction`; the
//! `Database` methods below cover the single-statement reads.

use crate::Database;
use crate::models::{
    ActivityRow, CollaboratorRow, CommentRow, FileRow, ReactionRow, ShareLinkRow, VersionRow,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

impl Database {
    pub fn get_level(&self, project_id: &str, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| get_level(conn, project_id, user_id))
    }

    pub fn get_share_link(&self, token_hash: &str) -> Result<Option<ShareLinkRow>> {
        self.with_conn(|conn| get_share_link(conn, token_hash))
    }

    pub fn get_activity(&self, project_id: &str, limit: u32) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| list_activity(conn, project_id, limit))
    }

    pub fn count_activity(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM activity", [], |r| r.get(0))?;
            Ok(count)
        })
    }

    /// Keep only the `keep` most recently appended records. Returns the
    /// number deleted.
    pub fn prune_activity(&self, keep: u32) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM activity
                 WHERE seq NOT IN (SELECT seq FROM activity ORDER BY seq DESC LIMIT ?1)",
                [keep],
            )?;
            Ok(deleted)
        })
    }
}

// -- Collaborators --

pub fn project_exists(conn: &Connection, project_id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM collaborators WHERE project_id = ?1)",
        [project_id],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub fn get_level(conn: &Connection, project_id: &str, user_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT level FROM collaborators WHERE project_id = ?1 AND user_id = ?2",
        [project_id, user_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn insert_collaborator(conn: &Connection, row: &CollaboratorRow) -> Result<()> {
    conn.execute(
        "INSERT INTO collaborators (project_id, user_id, level, added_at) VALUES (?1, ?2, ?3, ?4)",
        params![row.project_id, row.user_id, row.level, row.added_at],
    )?;
    Ok(())
}

pub fn update_collaborator_level(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
    level: &str,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE collaborators SET level = ?3 WHERE project_id = ?1 AND user_id = ?2",
        [project_id, user_id, level],
    )?;
    Ok(updated)
}

pub fn delete_collaborator(conn: &Connection, project_id: &str, user_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM collaborators WHERE project_id = ?1 AND user_id = ?2",
        [project_id, user_id],
    )?;
    Ok(deleted)
}

pub fn list_collaborators(conn: &Connection, project_id: &str) -> Result<Vec<CollaboratorRow>> {
    let mut stmt = conn.prepare(
        "SELECT project_id, user_id, level, added_at FROM collaborators
         WHERE project_id = ?1
         ORDER BY added_at, user_id",
    )?;

    let rows = stmt
        .query_map([project_id], |row| {
            Ok(CollaboratorRow {
                project_id: row.get(0)?,
                user_id: row.get(1)?,
                level: row.get(2)?,
                added_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Share links --

pub fn insert_share_link(conn: &Connection, row: &ShareLinkRow) -> Result<()> {
    conn.execute(
        "INSERT INTO share_links (token_hash, project_id, created_by, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.token_hash,
            row.project_id,
            row.created_by,
            row.created_at,
            row.expires_at
        ],
    )?;
    Ok(())
}

pub fn get_share_link(conn: &Connection, token_hash: &str) -> Result<Option<ShareLinkRow>> {
    conn.query_row(
        "SELECT token_hash, project_id, created_by, created_at, expires_at
         FROM share_links WHERE token_hash = ?1",
        [token_hash],
        |row| {
            Ok(ShareLinkRow {
                token_hash: row.get(0)?,
                project_id: row.get(1)?,
                created_by: row.get(2)?,
                created_at: row.get(3)?,
                expires_at: row.get(4)?,
            })
        },
    )
    .optional()
}

// -- Files --

const FILE_COLUMNS: &str =
    "id, project_id, path, content, created_at, created_by, updated_at, updated_by";

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        path: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        created_by: row.get(5)?,
        updated_at: row.get(6)?,
        updated_by: row.get(7)?,
    })
}

pub fn insert_file(conn: &Connection, row: &FileRow) -> Result<()> {
    conn.execute(
        "INSERT INTO files (id, project_id, path, content, created_at, created_by, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.id,
            row.project_id,
            row.path,
            row.content,
            row.created_at,
            row.created_by,
            row.updated_at,
            row.updated_by
        ],
    )?;
    Ok(())
}

pub fn get_file(conn: &Connection, file_id: &str) -> Result<Option<FileRow>> {
    let sql = format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS);
    conn.query_row(&sql, [file_id], file_from_row).optional()
}

pub fn file_path_exists(conn: &Connection, project_id: &str, path: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM files WHERE project_id = ?1 AND path = ?2)",
        [project_id, path],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub fn list_files(conn: &Connection, project_id: &str) -> Result<Vec<FileRow>> {
    let sql = format!(
        "SELECT {} FROM files WHERE project_id = ?1 ORDER BY path",
        FILE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([project_id], file_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_file_content(
    conn: &Connection,
    file_id: &str,
    content: &str,
    updated_at: &str,
    updated_by: &str,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE files SET content = ?2, updated_at = ?3, updated_by = ?4 WHERE id = ?1",
        [file_id, content, updated_at, updated_by],
    )?;
    Ok(updated)
}

pub fn delete_file(conn: &Connection, file_id: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
    Ok(deleted)
}

// -- Versions --

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        file_id: row.get(0)?,
        version_id: row.get(1)?,
        content: row.get(2)?,
        metadata: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Next sequential version id for a file. Must be called inside the same
/// transaction as the matching `insert_version`.
pub fn next_version_id(conn: &Connection, file_id: &str) -> Result<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(version_id), 0) + 1 FROM versions WHERE file_id = ?1",
        [file_id],
        |r| r.get(0),
    )?;
    Ok(next)
}

pub fn insert_version(conn: &Connection, row: &VersionRow) -> Result<()> {
    conn.execute(
        "INSERT INTO versions (file_id, version_id, content, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.file_id,
            row.version_id,
            row.content,
            row.metadata,
            row.created_at
        ],
    )?;
    Ok(())
}

pub fn get_version(conn: &Connection, file_id: &str, version_id: i64) -> Result<Option<VersionRow>> {
    conn.query_row(
        "SELECT file_id, version_id, content, metadata, created_at FROM versions
         WHERE file_id = ?1 AND version_id = ?2",
        params![file_id, version_id],
        version_from_row,
    )
    .optional()
}

/// All snapshots of a file, newest first.
pub fn list_versions(conn: &Connection, file_id: &str) -> Result<Vec<VersionRow>> {
    let mut stmt = conn.prepare(
        "SELECT file_id, version_id, content, metadata, created_at FROM versions
         WHERE file_id = ?1
         ORDER BY version_id DESC",
    )?;
    let rows = stmt
        .query_map([file_id], version_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Comments --

const COMMENT_COLUMNS: &str = "id, project_id, file_id, parent_id, author_id, content, \
     created_at, updated_at, is_resolved, resolved_by, resolved_at";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        file_id: row.get(2)?,
        parent_id: row.get(3)?,
        author_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        is_resolved: row.get(8)?,
        resolved_by: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

pub fn insert_comment(conn: &Connection, row: &CommentRow) -> Result<()> {
    conn.execute(
        "INSERT INTO comments (id, project_id, file_id, parent_id, author_id, content,
                               created_at, updated_at, is_resolved, resolved_by, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            row.id,
            row.project_id,
            row.file_id,
            row.parent_id,
            row.author_id,
            row.content,
            row.created_at,
            row.updated_at,
            row.is_resolved,
            row.resolved_by,
            row.resolved_at
        ],
    )?;
    Ok(())
}

pub fn get_comment(conn: &Connection, comment_id: &str) -> Result<Option<CommentRow>> {
    let sql = format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS);
    conn.query_row(&sql, [comment_id], comment_from_row).optional()
}

/// Every comment on a file, oldest first.
pub fn list_comments(conn: &Connection, project_id: &str, file_id: &str) -> Result<Vec<CommentRow>> {
    let sql = format!(
        "SELECT {} FROM comments
         WHERE project_id = ?1 AND file_id = ?2
         ORDER BY created_at, rowid",
        COMMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([project_id, file_id], comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_comment_content(
    conn: &Connection,
    comment_id: &str,
    content: &str,
    updated_at: &str,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
        [comment_id, content, updated_at],
    )?;
    Ok(updated)
}

pub fn set_comment_resolution(
    conn: &Connection,
    comment_id: &str,
    resolved: bool,
    resolved_by: Option<&str>,
    resolved_at: Option<&str>,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE comments SET is_resolved = ?2, resolved_by = ?3, resolved_at = ?4 WHERE id = ?1",
        params![comment_id, resolved, resolved_by, resolved_at],
    )?;
    Ok(updated)
}

/// Delete a comment together with its direct replies. Returns the number of
/// comments removed.
///
/// Replies go first in their own statement: rows removed by the
/// `ON DELETE CASCADE` action are not reported by `changes()`.
pub fn delete_comment_thread(conn: &Connection, comment_id: &str) -> Result<usize> {
    let replies = conn.execute("DELETE FROM comments WHERE parent_id = ?1", [comment_id])?;
    let parent = conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
    Ok(replies + parent)
}

/// Delete every comment on a file, replies first. Returns the number removed.
pub fn delete_file_comments(conn: &Connection, file_id: &str) -> Result<usize> {
    let replies = conn.execute(
        "DELETE FROM comments WHERE file_id = ?1 AND parent_id IS NOT NULL",
        [file_id],
    )?;
    let top_level = conn.execute("DELETE FROM comments WHERE file_id = ?1", [file_id])?;
    Ok(replies + top_level)
}

// -- Reactions --

/// Toggle a reaction: removes if exists, inserts if not.
/// Returns true when the reaction was added.
pub fn toggle_reaction(
    conn: &Connection,
    comment_id: &str,
    user_id: &str,
    emoji: &str,
    created_at: &str,
) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM comment_reactions WHERE comment_id = ?1 AND user_id = ?2 AND emoji = ?3",
        [comment_id, user_id, emoji],
    )?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO comment_reactions (comment_id, user_id, emoji, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        [comment_id, user_id, emoji, created_at],
    )?;
    Ok(true)
}

/// Batch-fetch reactions for every comment on a file.
pub fn list_reactions(conn: &Connection, project_id: &str, file_id: &str) -> Result<Vec<ReactionRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.comment_id, r.user_id, r.emoji, r.created_at
         FROM comment_reactions r
         JOIN comments c ON c.id = r.comment_id
         WHERE c.project_id = ?1 AND c.file_id = ?2
         ORDER BY r.created_at, r.rowid",
    )?;
    let rows = stmt
        .query_map([project_id, file_id], |row| {
            Ok(ReactionRow {
                comment_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Activity --

/// Append an activity record. Returns the assigned sequence number.
pub fn insert_activity(conn: &Connection, row: &ActivityRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO activity (project_id, file_id, actor_id, target_user_id, kind, timestamp, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.project_id,
            row.file_id,
            row.actor_id,
            row.target_user_id,
            row.kind,
            row.timestamp,
            row.details
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A project's records, newest first. Timestamp ties fall back to append order.
pub fn list_activity(conn: &Connection, project_id: &str, limit: u32) -> Result<Vec<ActivityRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, project_id, file_id, actor_id, target_user_id, kind, timestamp, details
         FROM activity
         WHERE project_id = ?1
         ORDER BY timestamp DESC, seq DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![project_id, limit], |row| {
            Ok(ActivityRow {
                seq: row.get(0)?,
                project_id: row.get(1)?,
                file_id: row.get(2)?,
                actor_id: row.get(3)?,
                target_user_id: row.get(4)?,
                kind: row.get(5)?,
                timestamp: row.get(6)?,
                details: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
