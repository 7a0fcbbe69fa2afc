//! Cookie-keyed session state for the checkout flow.

mod lock;
mod store;

pub use lock::SessionLocks;
pub use store::{MemorySessionStore, SessionStore};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PendingOrder;
use crate::state::AppState;
use crate::utils::error::AppError;

pub const SESSION_COOKIE: &str = "workshop_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Access code for an unlisted workshop, captured by the catalog.
    pub private_code: Option<String>,
    /// Discount code from the last rate page visit.
    pub discount_code: Option<String>,
    pub order: PendingOrder,
    pub messages: Vec<FlashMessage>,
}

impl SessionData {
    pub fn warn(&mut self, text: impl Into<String>) {
        self.messages.push(FlashMessage {
            level: Level::Warning,
            text: text.into(),
        });
    }
}

struct Inner {
    data: SessionData,
    modified: bool,
}

/// Handle to the current request's session. Reads go through [`Session::read`],
/// writes through [`Session::update`], which marks the session for saving.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                modified: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionData) -> R) -> R {
        f(&self.lock().data)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut inner = self.lock();
        inner.modified = true;
        f(&mut inner.data)
    }

    /// Removes and returns the pending flash messages.
    pub fn take_messages(&self) -> Vec<FlashMessage> {
        if self.read(|data| data.messages.is_empty()) {
            return Vec::new();
        }
        self.update(|data| std::mem::take(&mut data.messages))
    }

    fn snapshot(&self) -> Option<SessionData> {
        let inner = self.lock();
        inner.modified.then(|| inner.data.clone())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::InternalServerError("session layer is not installed".into()))
    }
}

/// Loads the visitor's session before the handler runs and stores it again
/// afterwards if the handler changed it. New sessions get their cookie here.
///
/// Requests for the same session hold its lock from load to save, so a
/// double-submitted form sees the state the first request left behind.
pub async fn manage_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    let _guard = match existing {
        Some(id) => Some(state.session_locks.acquire(id).await),
        None => None,
    };

    let loaded = match existing {
        Some(id) => state.sessions.load(id).await.map(|data| (id, data)),
        None => None,
    };
    let (id, data, fresh) = match loaded {
        Some((id, data)) => (id, data, false),
        None => (Uuid::new_v4(), SessionData::default(), true),
    };

    let session = Session::new(data);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(data) = session.snapshot() {
        state.sessions.save(id, data).await;
        if fresh {
            let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.config.secure_cookies)
                .build();
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, "Could not encode session cookie"),
            }
        }
    }

    response
}
