use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod attendees;
pub mod callback;
pub mod catalog;
pub mod confirm;
pub mod rates;
pub mod submit;

pub use attendees::{save_attendees, show_attendee_forms};
pub use callback::settle_order;
pub use catalog::list_workshops;
pub use confirm::confirm_order;
pub use rates::{select_rates, show_rates};
pub use submit::submit_order;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "workshop-checkout",
    };

    success(payload, "Health check successful").into_response()
}

pub(crate) fn rates_url(slug: &str) -> String {
    format!("/{}/", slug)
}

pub(crate) fn attendees_url(slug: &str) -> String {
    format!("/{}/order/", slug)
}

pub(crate) fn confirm_url(slug: &str) -> String {
    format!("/{}/confirm/", slug)
}

pub(crate) fn redirect(url: &str) -> Response {
    Redirect::to(url).into_response()
}
