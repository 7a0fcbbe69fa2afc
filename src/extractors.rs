use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::state::AppState;

/// Who is looking at the page. Staff may open draft workshops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Staff,
    Visitor,
}

impl Viewer {
    pub fn is_staff(self) -> bool {
        self == Viewer::Staff
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let Some(expected) = state.config.staff_token.as_deref() else {
            return Ok(Viewer::Visitor);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        Ok(match presented {
            Some(token) if token == expected => Viewer::Staff,
            _ => Viewer::Visitor,
        })
    }
}
