use crate::models::device::DeviceId;
use crate::models::session::Session;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-memory browser sessions, keyed by the id carried in the private cookie.
#[derive(Debug)]
pub struct SessionStore {
    ttl: ChronoDuration,
    cleanup_interval: Duration,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(ttl: ChronoDuration, cleanup_interval: Duration) -> Self {
        Self {
            ttl,
            cleanup_interval: cleanup_interval.max(Duration::from_secs(1)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        let cleanup_interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "expired sessions removed");
                }
            }
        });
    }

    /// Creates a session for `device_id`, dropping `replaces` if given so a
    /// browser cookie never references more than one live session.
    pub async fn create(&self, device_id: DeviceId, replaces: Option<Uuid>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            device_id,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = replaces {
            sessions.remove(&previous);
        }
        sessions.insert(session.id, session.clone());
        session
    }

    /// Returns the session if it exists and has not expired. Expired sessions
    /// are removed on sight.
    pub async fn get_active(&self, id: &Uuid) -> Option<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(session) if !session.is_expired(now) => Some(session.clone()),
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    pub async fn revoke(&self, id: &Uuid) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
