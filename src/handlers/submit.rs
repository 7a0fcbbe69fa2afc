use axum::extract::{Path, State};
use axum::response::Response;

use crate::db::StoreError;
use crate::gateway::{GatewayRequest, TicketLine};
use crate::handlers::confirm::{abandon_stale_order, submission_ready};
use crate::handlers::{rates_url, redirect};
use crate::models::{to_new_order, CapacityShortfall};
use crate::session::Session;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::relay;

/// Commits the pending order and hands the buyer over to the payment gateway.
///
/// The capacity re-check and the insert happen in one store call, so either
/// the whole order is saved or nothing is. On a shortfall the visitor is sent
/// back to the rate page with a warning and the order stays pending.
pub async fn submit_order(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let (skeleton, tickets) = match submission_ready(&session, &slug) {
        Ok(pending) => pending,
        Err(response) => return Ok(response),
    };

    let mut lines = Vec::with_capacity(tickets.len());
    for ticket in &tickets {
        let Some(line) = skeleton.line(ticket.rate_id) else {
            return Ok(abandon_stale_order(&session, &slug));
        };
        lines.push(TicketLine {
            rate_name: line.name.clone(),
            unit_price: line.price,
            attendee_name: ticket.name.clone(),
            attendee_email: ticket.email.clone(),
        });
    }

    let order = match state.store.place_order(to_new_order(&skeleton, &tickets)).await {
        Ok(order) => order,
        Err(StoreError::CapacityExceeded { rate, remaining }) => {
            let warning = CapacityShortfall { rate, remaining }.warning();
            tracing::info!(slug = %slug, remaining, "Order rejected, rate over capacity");
            session.update(|data| data.warn(warning));
            return Ok(redirect(&rates_url(&skeleton.workshop)));
        }
        Err(StoreError::UnknownRate(rate_id)) => {
            tracing::debug!(rate_id = %rate_id, "Order refers to a deleted rate");
            return Ok(abandon_stale_order(&session, &slug));
        }
        Err(e) => return Err(e.into()),
    };

    session.update(|data| data.order.clear());

    tracing::info!(
        slug = %slug,
        transaction_id = %order.transaction_id,
        tickets = lines.len(),
        total = %order.order_total,
        "Order placed, forwarding to payment gateway"
    );

    let request = GatewayRequest::build(&state.config.gateway, &order, &lines);
    let reply = state.gateway.submit(&request).await?;

    tracing::debug!(
        transaction_id = %order.transaction_id,
        status = reply.status,
        "Payment gateway replied"
    );
    Ok(relay(reply))
}
