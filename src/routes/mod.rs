use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{require_same_origin, SecurityHeadersLayer};
use crate::handlers::{
    confirm_order, health_check, list_workshops, save_attendees, select_rates, settle_order,
    show_attendee_forms, show_rates, submit_order,
};
use crate::session::manage_session;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    // Browser-facing pages share the session and the same-origin guard.
    let checkout = Router::new()
        .route("/", get(list_workshops))
        .route("/:slug/", get(show_rates).post(select_rates))
        .route(
            "/:slug/order/",
            get(show_attendee_forms).post(save_attendees),
        )
        .route("/:slug/confirm/", get(confirm_order))
        .route("/:slug/submit/", post(submit_order))
        .route_layer(from_fn_with_state(state.clone(), require_same_origin))
        .layer(from_fn_with_state(state.clone(), manage_session));

    // Called server to server by the payment gateway.
    let gateway = Router::new().route("/callback/", post(settle_order));

    Router::new()
        .route("/health", get(health_check))
        .merge(checkout)
        .merge(gateway)
        .layer(SecurityHeadersLayer::new(state.config.include_hsts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
