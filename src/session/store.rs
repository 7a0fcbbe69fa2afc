use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::SessionData;

/// Where session state is kept between requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `None` for unknown and expired sessions.
    async fn load(&self, id: Uuid) -> Option<SessionData>;

    async fn save(&self, id: Uuid, data: SessionData);
}

struct Entry {
    data: SessionData,
    touched: Instant,
}

/// Process-local sessions with an idle timeout. An expired session reads as
/// absent, which abandons any order it was holding.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: Uuid) -> Option<SessionData> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.touched.elapsed() <= self.ttl => {
                entry.touched = Instant::now();
                Some(entry.data.clone())
            }
            Some(_) => {
                tracing::debug!(session = %id, "Session expired");
                entries.remove(&id);
                None
            }
            None => None,
        }
    }

    async fn save(&self, id: Uuid, data: SessionData) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.touched.elapsed() <= ttl);
        entries.insert(
            id,
            Entry {
                data,
                touched: Instant::now(),
            },
        );
    }
}
