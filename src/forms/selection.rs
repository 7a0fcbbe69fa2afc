use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::forms::{required_email, required_text, FormErrors, REQUIRED};
use crate::models::{Rate, RateLine};

pub const EMPTY_ORDER: &str = "Order can not be empty.";

/// Quantity input for one offered rate. Sold-out rates are shown disabled and
/// whatever is posted for them is ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityField {
    pub key: String,
    pub rate_id: Uuid,
    pub rate_name: String,
    pub price: Decimal,
    pub remaining: i64,
    pub disabled: bool,
}

/// The rate selection form, built per request from the rates on offer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionForm {
    fields: Vec<QuantityField>,
}

/// A valid selection: who is ordering and how many tickets of each rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub contact_name: String,
    pub contact_email: String,
    /// Only rates with a positive quantity, in offer order.
    pub lines: Vec<RateLine>,
}

pub fn field_key(rate_id: Uuid) -> String {
    format!("rate-{}", rate_id)
}

impl SelectionForm {
    pub fn for_rates(rates: &[Rate]) -> Self {
        let fields = rates
            .iter()
            .map(|rate| QuantityField {
                key: field_key(rate.id),
                rate_id: rate.id,
                rate_name: rate.name.clone(),
                price: rate.price,
                remaining: rate.remaining(),
                disabled: rate.sold_out(),
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[QuantityField] {
        &self.fields
    }

    pub fn validate(&self, data: &HashMap<String, String>) -> Result<Selection, FormErrors> {
        let mut errors = FormErrors::default();

        let contact_name = required_text(data, "name", &mut errors);
        let contact_email = required_email(data, "email", &mut errors);

        let mut lines = Vec::new();
        let mut quantities_valid = true;
        for field in self.fields.iter().filter(|field| !field.disabled) {
            match parse_quantity(field, data.get(&field.key).map(String::as_str)) {
                Ok(0) => {}
                Ok(quantity) => lines.push(RateLine {
                    rate_id: field.rate_id,
                    name: field.rate_name.clone(),
                    price: field.price,
                    quantity,
                }),
                Err(message) => {
                    quantities_valid = false;
                    errors.add(field.key.clone(), message);
                }
            }
        }

        if quantities_valid && lines.is_empty() {
            errors.add_non_field(EMPTY_ORDER);
        }

        match (contact_name, contact_email) {
            (Some(contact_name), Some(contact_email)) => errors.into_result(Selection {
                contact_name,
                contact_email,
                lines,
            }),
            _ => Err(errors),
        }
    }
}

fn parse_quantity(field: &QuantityField, raw: Option<&str>) -> Result<u32, String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(REQUIRED.to_string());
    }
    let quantity: i64 = raw
        .parse()
        .map_err(|_| "Enter a whole number.".to_string())?;
    if quantity < 0 {
        return Err("Ensure this value is greater than or equal to 0.".to_string());
    }
    if quantity > field.remaining {
        return Err(format!(
            "Only {} ticket(s) remaining at this rate.",
            field.remaining
        ));
    }
    u32::try_from(quantity).map_err(|_| "Enter a whole number.".to_string())
}
