use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// How long a user stays listed after their last `mark_active`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often clients should call `mark_active` to stay listed.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Who has which file open. Never persisted, never audited.
#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<PresenceInner>,
}

struct PresenceInner {
    timeout: Duration,

    /// (project_id, file_id) -> (user_id -> deadline)
    files: RwLock<HashMap<(Uuid, Uuid), HashMap<Uuid, Instant>>>,
}

impl PresenceTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(PresenceInner {
                timeout,
                files: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// List the user on the file until `timeout` from now. Calling again
    /// only pushes the deadline back.
    pub async fn mark_active(&self, project_id: Uuid, file_id: Uuid, user_id: Uuid) {
        let deadline = Instant::now() + self.inner.timeout;
        let mut files = self.inner.files.write().await;
        let previous = files
            .entry((project_id, file_id))
            .or_default()
            .insert(user_id, deadline);
        if previous.is_none() {
            debug!("{} opened file {} in project {}", user_id, file_id, project_id);
        }
    }

    /// Drop the user from the file. Absent entries are a no-op.
    pub async fn mark_inactive(&self, project_id: Uuid, file_id: Uuid, user_id: Uuid) {
        let mut files = self.inner.files.write().await;
        if let Some(users) = files.get_mut(&(project_id, file_id)) {
            if users.remove(&user_id).is_some() {
                debug!("{} left file {} in project {}", user_id, file_id, project_id);
            }
            if users.is_empty() {
                files.remove(&(project_id, file_id));
            }
        }
    }

    /// Everyone currently listed on the file, including the caller.
    pub async fn active_users(&self, project_id: Uuid, file_id: Uuid) -> Vec<Uuid> {
        let now = Instant::now();
        let files = self.inner.files.read().await;
        let mut users: Vec<Uuid> = files
            .get(&(project_id, file_id))
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, deadline)| **deadline > now)
                    .map(|(user_id, _)| *user_id)
                    .collect()
            })
            .unwrap_or_default();
        users.sort();
        users
    }

    /// Remove every lapsed entry and any file left empty. Returns how many
    /// entries were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut files = self.inner.files.write().await;
        let mut removed = 0;
        files.retain(|_, users| {
            let before = users.len();
            users.retain(|_, deadline| *deadline > now);
            removed += before - users.len();
            !users.is_empty()
        });
        removed
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Background task that expires lapsed presence entries.
pub async fn run_sweep_loop(presence: PresenceTracker, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let removed = presence.sweep().await;
        if removed > 0 {
            info!("Presence sweep: expired {} entries", removed);
        }
    }
}
