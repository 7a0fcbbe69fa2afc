use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::models::Workshop;
use crate::session::Session;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub code: Option<String>,
}

#[derive(Serialize)]
struct CatalogPage {
    /// True when the list holds workshops unlocked by an access code.
    private: bool,
    workshops: Vec<Workshop>,
}

/// Lists the workshops open for browsing. An access code in the query is
/// remembered for the rest of the visit and, when it unlocks unlisted
/// workshops, shows those instead.
pub async fn list_workshops(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
    session: Session,
) -> Result<Response, AppError> {
    let code = query
        .code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());

    if let Some(code) = &code {
        session.update(|data| data.private_code = Some(code.clone()));

        let unlocked = state.store.workshops_by_private_code(code).await?;
        if !unlocked.is_empty() {
            tracing::debug!(count = unlocked.len(), "Access code unlocked workshops");
            let page = CatalogPage {
                private: true,
                workshops: unlocked,
            };
            return Ok(success(page, "Workshops").into_response());
        }
    }

    let page = CatalogPage {
        private: false,
        workshops: state.store.public_workshops().await?,
    };
    Ok(success(page, "Workshops").into_response())
}
