use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::handlers::{attendees_url, rates_url, redirect};
use crate::models::{OrderSkeleton, SessionStateError, TicketDraft};
use crate::session::Session;
use crate::state::AppState;
use crate::utils::error::{AppError, OptionExt};
use crate::utils::response::success;

pub(crate) const STALE_ORDER: &str =
    "Some of the rates in your order are no longer available. Please select your tickets again.";

#[derive(Serialize)]
struct ConfirmedTicket {
    rate: String,
    price: Decimal,
    name: String,
    email: String,
}

#[derive(Serialize)]
struct ConfirmPage {
    workshop: String,
    contact_name: String,
    contact_email: String,
    order_total: Decimal,
    tickets: Vec<ConfirmedTicket>,
}

/// The pending order when it is ready to submit, or where to send the
/// visitor to finish it.
pub(crate) fn submission_ready(
    session: &Session,
    slug: &str,
) -> Result<(OrderSkeleton, Vec<TicketDraft>), Response> {
    session
        .read(|data| {
            data.order
                .ready_for_submission(slug)
                .map(|(skeleton, tickets)| (skeleton.clone(), tickets.to_vec()))
        })
        .map_err(|err| match err {
            SessionStateError::NoOrder => redirect(&rates_url(slug)),
            SessionStateError::MissingTickets => redirect(&attendees_url(slug)),
        })
}

/// Drops a pending order that no longer matches the catalog and sends the
/// visitor back to pick rates again.
pub(crate) fn abandon_stale_order(session: &Session, slug: &str) -> Response {
    tracing::warn!(slug, "Pending order refers to a rate that no longer exists");
    session.update(|data| {
        data.order.clear();
        data.warn(STALE_ORDER);
    });
    redirect(&rates_url(slug))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let (skeleton, tickets) = match submission_ready(&session, &slug) {
        Ok(pending) => pending,
        Err(response) => return Ok(response),
    };

    let workshop = state
        .store
        .workshop_by_slug(&slug)
        .await?
        .or_not_found(format!("Workshop '{}' not found", slug))?;
    let rates: HashMap<_, _> = state
        .store
        .rates_for_workshop(workshop.id)
        .await?
        .into_iter()
        .map(|rate| (rate.id, rate))
        .collect();

    let mut confirmed = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let Some(rate) = rates.get(&ticket.rate_id) else {
            return Ok(abandon_stale_order(&session, &slug));
        };
        confirmed.push(ConfirmedTicket {
            rate: rate.name.clone(),
            price: rate.price,
            name: ticket.name,
            email: ticket.email,
        });
    }

    let page = ConfirmPage {
        workshop: workshop.slug,
        contact_name: skeleton.contact_name,
        contact_email: skeleton.contact_email,
        order_total: skeleton.order_total,
        tickets: confirmed,
    };
    Ok(success(page, "Confirm order").into_response())
}
