use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (permissions, files, versions, comments, activity)");
        conn.execute_batch(
            "
            CREATE TABLE collaborators (
                project_id  TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                level       TEXT NOT NULL CHECK (level IN ('owner', 'editor', 'viewer')),
                added_at    TEXT NOT NULL,
                PRIMARY KEY (project_id, user_id)
            );

            -- Exactly one owner per project
            CREATE UNIQUE INDEX idx_collaborators_single_owner
                ON collaborators(project_id) WHERE level = 'owner';

            CREATE TABLE share_links (
                token_hash  TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL,
                created_by  TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                expires_at  TEXT
            );

            CREATE TABLE files (
                id          TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL,
                path        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                created_by  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                updated_by  TEXT NOT NULL,
                UNIQUE(project_id, path)
            );

            -- No FK to files: history outlives the live file.
            CREATE TABLE versions (
                file_id     TEXT NOT NULL,
                version_id  INTEGER NOT NULL,
                content     TEXT NOT NULL,
                metadata    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (file_id, version_id)
            );

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL,
                file_id     TEXT NOT NULL,
                parent_id   TEXT REFERENCES comments(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT,
                is_resolved INTEGER NOT NULL DEFAULT 0,
                resolved_by TEXT,
                resolved_at TEXT
            );

            CREATE INDEX idx_comments_file
                ON comments(project_id, file_id, created_at);

            CREATE TABLE comment_reactions (
                comment_id  TEXT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(comment_id, user_id, emoji)
            );

            CREATE TABLE activity (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id      TEXT NOT NULL,
                file_id         TEXT,
                actor_id        TEXT NOT NULL,
                target_user_id  TEXT,
                kind            TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                details         TEXT NOT NULL
            );

            CREATE INDEX idx_activity_project
                ON activity(project_id, timestamp);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
