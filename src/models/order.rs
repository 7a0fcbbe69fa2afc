use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    /// Correlation key shared with the payment gateway.
    pub transaction_id: Uuid,
    pub contact_name: String,
    pub contact_email: String,
    pub order_total: Decimal,
    pub order_datetime: DateTime<Utc>,
    /// Amount confirmed by the gateway, exactly as it was reported.
    pub billed_total: Option<String>,
    pub billed_datetime: Option<String>,
    pub refunded: bool,
}

impl Order {
    pub fn is_billed(&self) -> bool {
        self.billed_total.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub rate_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub contact_name: String,
    pub contact_email: String,
    pub order_total: Decimal,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub rate_id: Uuid,
    pub name: String,
    pub email: String,
}

impl NewOrder {
    /// Number of requested tickets per rate.
    pub fn tally(&self) -> BTreeMap<Uuid, i64> {
        let mut tally = BTreeMap::new();
        for item in &self.items {
            *tally.entry(item.rate_id).or_insert(0) += 1;
        }
        tally
    }
}

#[derive(Debug, Clone)]
pub struct Settlement {
    pub transaction_id: Uuid,
    pub billed_total: String,
    pub billed_datetime: String,
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Recorded(Order),
    /// The order was settled by an earlier callback and was left unchanged.
    AlreadyBilled(Order),
    UnknownTransaction,
}
