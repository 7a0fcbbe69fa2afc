use std::collections::HashMap;

use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::Form;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::forms::{AttendeeFormSet, FormErrors};
use crate::handlers::{confirm_url, rates_url, redirect};
use crate::models::{OrderSkeleton, RateLine};
use crate::session::Session;
use crate::utils::response::{rejected, success};

#[derive(Serialize)]
struct AttendeePage {
    workshop: String,
    contact_name: String,
    contact_email: String,
    lines: Vec<RateLine>,
    order_total: Decimal,
    formset: AttendeeFormSet,
    errors: Option<FormErrors>,
}

impl AttendeePage {
    fn new(skeleton: OrderSkeleton, formset: AttendeeFormSet, errors: Option<FormErrors>) -> Self {
        Self {
            workshop: skeleton.workshop,
            contact_name: skeleton.contact_name,
            contact_email: skeleton.contact_email,
            lines: skeleton.lines,
            order_total: skeleton.order_total,
            formset,
            errors,
        }
    }
}

/// The pending skeleton for `slug` and a formset built from it.
fn pending(session: &Session, slug: &str) -> Option<(OrderSkeleton, AttendeeFormSet)> {
    session.read(|data| {
        let skeleton = data.order.skeleton_for(slug).ok()?;
        let formset = AttendeeFormSet::from_skeleton(skeleton, data.order.tickets());
        Some((skeleton.clone(), formset))
    })
}

pub async fn show_attendee_forms(Path(slug): Path<String>, session: Session) -> Response {
    let Some((skeleton, formset)) = pending(&session, &slug) else {
        return redirect(&rates_url(&slug));
    };

    success(AttendeePage::new(skeleton, formset, None), "Attendees").into_response()
}

pub async fn save_attendees(
    Path(slug): Path<String>,
    session: Session,
    Form(data): Form<HashMap<String, String>>,
) -> Response {
    let Some((skeleton, formset)) = pending(&session, &slug) else {
        return redirect(&rates_url(&slug));
    };

    let tickets = match formset.validate(&data) {
        Ok(tickets) => tickets,
        Err(errors) => {
            let page = AttendeePage::new(skeleton, formset, Some(errors));
            return rejected(page, "Please correct the errors below.");
        }
    };

    let count = tickets.len();
    match session.update(|data| data.order.attach_tickets(&slug, tickets)) {
        Ok(()) => {
            tracing::debug!(slug = %slug, tickets = count, "Attendees saved");
            redirect(&confirm_url(&slug))
        }
        Err(_) => redirect(&rates_url(&slug)),
    }
}
