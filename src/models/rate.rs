use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::workshop::is_slug;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rate {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub capacity: i32,
    pub discount: bool,
    #[serde(skip_serializing)]
    pub discount_code: Option<String>,
    /// Tickets held by committed, non-refunded orders.
    pub ticket_count: i64,
}

impl Rate {
    pub fn sold_out(&self) -> bool {
        self.ticket_count >= i64::from(self.capacity)
    }

    pub fn remaining(&self) -> i64 {
        (i64::from(self.capacity) - self.ticket_count).max(0)
    }

    /// Fails when `requested` more tickets would push this rate past capacity.
    pub fn check_capacity(&self, requested: i64) -> Result<(), CapacityShortfall> {
        if self.ticket_count + requested > i64::from(self.capacity) {
            return Err(CapacityShortfall {
                rate: self.name.clone(),
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityShortfall {
    pub rate: String,
    pub remaining: i64,
}

impl CapacityShortfall {
    pub fn warning(&self) -> String {
        format!(
            "There are too many {} tickets in this order. Ticket(s) remaining at this rate: {}.",
            self.rate, self.remaining
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    UnknownRate(Uuid),
    Shortfall(CapacityShortfall),
}

/// Checks a per-rate tally against current ticket counts. Rates are visited in
/// id order so the first shortfall reported is stable.
pub fn check_tally(
    tally: &BTreeMap<Uuid, i64>,
    rates: &BTreeMap<Uuid, Rate>,
) -> Result<(), TallyError> {
    for (rate_id, requested) in tally {
        let rate = rates.get(rate_id).ok_or(TallyError::UnknownRate(*rate_id))?;
        rate.check_capacity(*requested).map_err(TallyError::Shortfall)?;
    }
    Ok(())
}

/// Selects the rates offered for a discount code. A code matching at least one
/// rate offers exactly those rates; anything else falls back to the
/// non-discounted rates. Sold-out rates are kept so they can be flagged.
pub fn filter_rates(rates: &[Rate], discount_code: Option<&str>) -> Vec<Rate> {
    let mut offered: Vec<Rate> = match discount_code {
        Some(code) => rates
            .iter()
            .filter(|rate| rate.discount_code.as_deref() == Some(code))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    if offered.is_empty() {
        offered = rates.iter().filter(|rate| !rate.discount).cloned().collect();
    }

    offered.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
    offered
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRate {
    pub workshop_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub capacity: i32,
    #[serde(default)]
    pub discount: bool,
    #[serde(default)]
    pub discount_code: Option<String>,
}

impl NewRate {
    /// Discount rates without a code get a generated one; uniqueness of the
    /// code is enforced by the store.
    pub fn validate(mut self) -> Result<Self, String> {
        if self.name.trim().is_empty() {
            return Err("A rate needs a name.".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("Price can not be negative.".to_string());
        }
        if self.capacity < 0 {
            return Err("Capacity can not be negative.".to_string());
        }
        self.price.rescale(2);
        self.discount_code = self.discount_code.filter(|code| !code.is_empty());
        match self.discount_code.as_deref() {
            Some(code) if !is_slug(code) => {
                return Err(format!("'{}' is not a valid discount code", code));
            }
            None if self.discount => self.discount_code = Some(Uuid::new_v4().to_string()),
            _ => {}
        }
        Ok(self)
    }
}
