//! Conversions between stored rows and the shared data model. A row that
//! fails to parse is corrupt storage and surfaces as `Unavailable`.

use anyhow::{Context, anyhow};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;

use inkwell_db::models::{
    ActivityRow, CollaboratorRow, CommentRow, FileRow, ShareLinkRow, VersionRow,
};
use inkwell_types::models::{
    ActivityRecord, ActivityType, CapabilityLevel, Collaborator, Comment, FileRecord, ShareLink,
    Version, VersionMetadata,
};

use crate::error::Result;

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so lexical order matches chronological order.
pub(crate) fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(parsed)
}

fn parse_opt_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_time).transpose()
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    let id = raw
        .parse::<Uuid>()
        .with_context(|| format!("corrupt id '{}'", raw))?;
    Ok(id)
}

fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub(crate) fn parse_level(raw: &str) -> Result<CapabilityLevel> {
    let level = raw
        .parse::<CapabilityLevel>()
        .map_err(|e| anyhow!("corrupt level: {}", e))?;
    Ok(level)
}

pub(crate) fn collaborator(row: CollaboratorRow) -> Result<Collaborator> {
    let level = parse_level(&row.level)?;
    Ok(Collaborator {
        project_id: parse_id(&row.project_id)?,
        user_id: parse_id(&row.user_id)?,
        level,
        description: level.description().to_string(),
        added_at: parse_time(&row.added_at)?,
    })
}

pub(crate) fn share_link(row: ShareLinkRow) -> Result<ShareLink> {
    Ok(ShareLink {
        project_id: parse_id(&row.project_id)?,
        created_by: parse_id(&row.created_by)?,
        created_at: parse_time(&row.created_at)?,
        expires_at: parse_opt_time(row.expires_at.as_deref())?,
    })
}

pub(crate) fn file(row: FileRow) -> Result<FileRecord> {
    Ok(FileRecord {
        id: parse_id(&row.id)?,
        project_id: parse_id(&row.project_id)?,
        path: row.path,
        content: row.content,
        created_at: parse_time(&row.created_at)?,
        created_by: parse_id(&row.created_by)?,
        updated_at: parse_time(&row.updated_at)?,
        updated_by: parse_id(&row.updated_by)?,
    })
}

pub(crate) fn version(row: VersionRow) -> Result<Version> {
    let metadata: VersionMetadata = serde_json::from_str(&row.metadata)
        .with_context(|| format!("corrupt metadata on version {} of {}", row.version_id, row.file_id))?;
    Ok(Version {
        file_id: parse_id(&row.file_id)?,
        version_id: u64::try_from(row.version_id)
            .with_context(|| format!("corrupt version id {}", row.version_id))?,
        content: row.content,
        timestamp: parse_time(&row.created_at)?,
        metadata,
    })
}

pub(crate) fn comment(row: CommentRow) -> Result<Comment> {
    Ok(Comment {
        id: parse_id(&row.id)?,
        project_id: parse_id(&row.project_id)?,
        file_id: parse_id(&row.file_id)?,
        parent_id: parse_opt_id(row.parent_id.as_deref())?,
        author_id: parse_id(&row.author_id)?,
        content: row.content,
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_opt_time(row.updated_at.as_deref())?,
        is_resolved: row.is_resolved,
        resolved_by: parse_opt_id(row.resolved_by.as_deref())?,
        resolved_at: parse_opt_time(row.resolved_at.as_deref())?,
        reactions: Vec::new(),
    })
}

pub(crate) fn activity(row: ActivityRow) -> Result<ActivityRecord> {
    let kind = row
        .kind
        .parse::<ActivityType>()
        .map_err(|e| anyhow!("corrupt activity type on record {}: {}", row.seq, e))?;
    let details: serde_json::Value = serde_json::from_str(&row.details)
        .with_context(|| format!("corrupt details on activity record {}", row.seq))?;
    Ok(ActivityRecord {
        seq: row.seq,
        project_id: parse_id(&row.project_id)?,
        file_id: parse_opt_id(row.file_id.as_deref())?,
        actor_id: parse_id(&row.actor_id)?,
        target_user_id: parse_opt_id(row.target_user_id.as_deref())?,
        kind,
        timestamp: parse_time(&row.timestamp)?,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_sort_chronologically() {
        let early = parse_time("2026-03-01T09:59:59.999999Z").unwrap();
        let late = parse_time("2026-03-01T10:00:00Z").unwrap();
        assert!(stamp(early) < stamp(late));
        assert_eq!(stamp(late), "2026-03-01T10:00:00.000000Z");
    }

    #[test]
    fn stamp_round_trips_at_stored_precision() {
        let t = now();
        assert_eq!(parse_time(&stamp(t)).unwrap(), t);
    }

    #[test]
    fn corrupt_rows_are_unavailable() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, crate::StoreError::Unavailable(_)));
    }
}
