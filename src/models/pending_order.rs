//! The in-progress order a visitor builds across the rate, attendee and
//! confirmation steps. It only lives in the session until it is submitted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::{NewOrder, NewOrderItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLine {
    pub rate_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl RateLine {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSkeleton {
    /// Slug of the workshop the order was started for.
    pub workshop: String,
    pub contact_name: String,
    pub contact_email: String,
    pub lines: Vec<RateLine>,
    pub order_total: Decimal,
}

impl OrderSkeleton {
    pub fn new(
        workshop: impl Into<String>,
        contact_name: impl Into<String>,
        contact_email: impl Into<String>,
        lines: Vec<RateLine>,
    ) -> Self {
        let order_total = lines.iter().map(RateLine::subtotal).sum();
        Self {
            workshop: workshop.into(),
            contact_name: contact_name.into(),
            contact_email: contact_email.into(),
            lines,
            order_total,
        }
    }

    pub fn ticket_count(&self) -> usize {
        self.lines.iter().map(|line| line.quantity as usize).sum()
    }

    /// One slot per ticket, in rate order: a line with quantity three yields
    /// three consecutive slots for that rate.
    pub fn ticket_slots(&self) -> Vec<&RateLine> {
        self.lines
            .iter()
            .flat_map(|line| std::iter::repeat(line).take(line.quantity as usize))
            .collect()
    }

    pub fn line(&self, rate_id: Uuid) -> Option<&RateLine> {
        self.lines.iter().find(|line| line.rate_id == rate_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub rate_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("no order has been started for this workshop")]
    NoOrder,
    #[error("attendee details have not been entered")]
    MissingTickets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PendingOrder {
    #[default]
    Empty,
    Skeleton(OrderSkeleton),
    WithTickets {
        skeleton: OrderSkeleton,
        tickets: Vec<TicketDraft>,
    },
}

impl PendingOrder {
    /// Starts over with a fresh skeleton, dropping whatever was pending.
    pub fn start(&mut self, skeleton: OrderSkeleton) {
        *self = PendingOrder::Skeleton(skeleton);
    }

    pub fn clear(&mut self) {
        *self = PendingOrder::Empty;
    }

    fn skeleton(&self) -> Option<&OrderSkeleton> {
        match self {
            PendingOrder::Empty => None,
            PendingOrder::Skeleton(skeleton) | PendingOrder::WithTickets { skeleton, .. } => {
                Some(skeleton)
            }
        }
    }

    /// The skeleton, but only when it was started for `slug`.
    pub fn skeleton_for(&self, slug: &str) -> Result<&OrderSkeleton, SessionStateError> {
        self.skeleton()
            .filter(|skeleton| skeleton.workshop == slug)
            .ok_or(SessionStateError::NoOrder)
    }

    pub fn tickets(&self) -> Option<&[TicketDraft]> {
        match self {
            PendingOrder::WithTickets { tickets, .. } => Some(tickets),
            _ => None,
        }
    }

    /// Records attendee details. Re-entering them replaces the earlier set.
    pub fn attach_tickets(
        &mut self,
        slug: &str,
        tickets: Vec<TicketDraft>,
    ) -> Result<(), SessionStateError> {
        let skeleton = self.skeleton_for(slug)?.clone();
        *self = PendingOrder::WithTickets { skeleton, tickets };
        Ok(())
    }

    pub fn ready_for_submission(
        &self,
        slug: &str,
    ) -> Result<(&OrderSkeleton, &[TicketDraft]), SessionStateError> {
        let skeleton = self.skeleton_for(slug)?;
        let tickets = self.tickets().ok_or(SessionStateError::MissingTickets)?;
        Ok((skeleton, tickets))
    }
}

/// Builds the rows to persist from a submission-ready order.
pub fn to_new_order(skeleton: &OrderSkeleton, tickets: &[TicketDraft]) -> NewOrder {
    NewOrder {
        contact_name: skeleton.contact_name.clone(),
        contact_email: skeleton.contact_email.clone(),
        order_total: skeleton.order_total,
        items: tickets
            .iter()
            .map(|ticket| NewOrderItem {
                rate_id: ticket.rate_id,
                name: ticket.name.clone(),
                email: ticket.email.clone(),
            })
            .collect(),
    }
}
