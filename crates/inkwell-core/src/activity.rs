use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use inkwell_db::Database;
use inkwell_db::models::ActivityRow;
use inkwell_db::queries;
use inkwell_types::models::{ActivityRecord, NewActivity};

use crate::error::Result;
use crate::rows;

/// Global number of records kept by `prune`, across all projects.
pub const DEFAULT_RETENTION: u32 = 100;

/// Records returned by `query_by_project` when the caller gives no limit.
pub const DEFAULT_QUERY_LIMIT: u32 = 20;

/// Append an audit record on `conn`.
///
/// This is the only write path into the log. Stores call it inside the
/// transaction of the mutation being recorded, so a rolled-back mutation
/// leaves no record behind.
pub(crate) fn append(conn: &Connection, activity: NewActivity) -> Result<ActivityRecord> {
    let timestamp = activity.timestamp.unwrap_or_else(rows::now);
    let row = ActivityRow {
        seq: 0,
        project_id: activity.project_id.to_string(),
        file_id: activity.file_id.map(|id| id.to_string()),
        actor_id: activity.actor_id.to_string(),
        target_user_id: activity.target_user_id.map(|id| id.to_string()),
        kind: activity.kind.as_str().to_string(),
        timestamp: rows::stamp(timestamp),
        details: activity.details.to_string(),
    };
    let seq = queries::insert_activity(conn, &row)?;

    debug!(
        "activity #{} {} on project {} by {}",
        seq, activity.kind, activity.project_id, activity.actor_id
    );

    Ok(ActivityRecord {
        seq,
        project_id: activity.project_id,
        file_id: activity.file_id,
        actor_id: activity.actor_id,
        target_user_id: activity.target_user_id,
        kind: activity.kind,
        timestamp,
        details: activity.details,
    })
}

/// Bounded, chronologically ordered audit trail shared by every project.
pub struct ActivityLog {
    db: Arc<Database>,
    retention: u32,
}

impl ActivityLog {
    pub fn new(db: Arc<Database>, retention: u32) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }

    /// A project's records, newest first, at most `limit` of them.
    pub fn query_by_project(&self, project_id: Uuid, limit: u32) -> Result<Vec<ActivityRecord>> {
        self.db
            .get_activity(&project_id.to_string(), limit)?
            .into_iter()
            .map(rows::activity)
            .collect()
    }

    /// Total records currently held, across all projects.
    pub fn len(&self) -> Result<u64> {
        let count = self.db.count_activity()?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Drop everything but the `retention` most recently appended records.
    /// The cap is global, so a busy project can evict a quiet one's history.
    pub fn prune(&self) -> Result<usize> {
        let removed = self.db.prune_activity(self.retention)?;
        if removed > 0 {
            info!("Activity prune: removed {} records (cap {})", removed, self.retention);
        }
        Ok(removed)
    }
}

/// Background task that enforces the retention cap on an interval.
pub async fn run_prune_loop(log: Arc<ActivityLog>, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let log = log.clone();
        match tokio::task::spawn_blocking(move || log.prune()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Activity prune error: {}", e),
            Err(e) => warn!("Activity prune task failed: {}", e),
        }
    }
}
