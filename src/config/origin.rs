use axum::extract::{Request, State};
use axum::http::header::{ORIGIN, REFERER};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;
use crate::utils::error::AppError;

/// Rejects state-changing requests that were not sent from one of our own
/// pages. Safe methods pass through untouched.
pub async fn require_same_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method().is_safe() {
        return next.run(request).await;
    }

    match request_origin(request.headers()) {
        Some(origin) if state.config.site_origins.iter().any(|o| *o == origin) => {
            next.run(request).await
        }
        Some(origin) => {
            tracing::warn!(
                origin = %origin,
                path = %request.uri().path(),
                "Cross-origin request blocked"
            );
            AppError::Forbidden("Cross-origin request blocked".to_string()).into_response()
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Request without origin blocked");
            AppError::Forbidden("Missing request origin".to_string()).into_response()
        }
    }
}

/// The origin a request claims to come from: the `Origin` header if present,
/// otherwise the scheme and authority of the `Referer`.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
        if origin != "null" {
            return Some(origin.trim_end_matches('/').to_lowercase());
        }
    }

    let referer = headers.get(REFERER)?.to_str().ok()?;
    let (scheme, rest) = referer.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    if authority.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, authority).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_origin_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://Shop.example.org"));
        headers.insert(REFERER, HeaderValue::from_static("https://other.example.org/x"));
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("https://shop.example.org")
        );
    }

    #[test]
    fn test_referer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_static("http://localhost:3001/intro-2024/confirm/?x=1"),
        );
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("http://localhost:3001")
        );
    }

    #[test]
    fn test_null_origin_without_referer() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("null"));
        assert_eq!(request_origin(&headers), None);
        assert_eq!(request_origin(&HeaderMap::new()), None);
    }
}
