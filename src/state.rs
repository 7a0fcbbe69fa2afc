use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Store;
use crate::gateway::PaymentGateway;
use crate::session::{SessionLocks, SessionStore};

/// Shared handles every handler and middleware can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_locks: Arc<SessionLocks>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            session_locks: Arc::new(SessionLocks::new()),
            gateway,
            config: Arc::new(config),
        }
    }
}
