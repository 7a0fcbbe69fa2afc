//! The hosted payment page we hand buyers over to after their order is saved.

mod client;

pub use client::HttpGateway;

use async_trait::async_trait;
use axum::body::Bytes;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::models::Order;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not load gateway certificate bundle: {0}")]
    Certificate(String),
}

/// Whatever the gateway answered, passed back to the browser as-is.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn submit(&self, request: &GatewayRequest) -> Result<GatewayReply, GatewayError>;
}

/// One purchased ticket as the gateway itemises it.
#[derive(Debug, Clone)]
pub struct TicketLine {
    pub rate_name: String,
    pub unit_price: Decimal,
    pub attendee_name: String,
    pub attendee_email: String,
}

const METADATA_DESCRIPTION: usize = 0;
const METADATA_QUANTITY: usize = 1;
const METADATA_UNIT_PRICE: usize = 2;
const METADATA_EXTENDED_PRICE: usize = 3;
const METADATA_SPEEDTYPE: usize = 4;
const METADATA_ACCOUNT: usize = 5;

/// Form fields of a payment request, in the order they are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRequest {
    fields: Vec<(String, String)>,
}

impl GatewayRequest {
    pub fn build(config: &GatewayConfig, order: &Order, tickets: &[TicketLine]) -> Self {
        let (first_name, last_name) = split_contact_name(&order.contact_name);

        let mut request = GatewayRequest::default();
        request.push("LMID", &config.merchant_id);
        request.push("unique_id", order.transaction_id.to_string());
        request.push("sTotal", format_amount(order.order_total));
        request.push("webTitle", &config.title);
        request.push("Trans_Desc", &config.description);
        request.push("contact_info", &config.contact_info);
        request.push("BILL_CUSTOMER_EMAIL", &order.contact_email);
        request.push("BILL_CUSTOMER_FIRSTNAME", first_name);
        request.push("BILL_CUSTOMER_LASTNAME", last_name);
        request.push("note", "");
        request.push("arrayname", "metadata");

        for (row, ticket) in tickets.iter().enumerate() {
            let price = format_amount(ticket.unit_price);
            request.push_item(
                METADATA_DESCRIPTION,
                row,
                format!(
                    "{}: {} ({})",
                    ticket.rate_name,
                    quote_plus(&ticket.attendee_name),
                    ticket.attendee_email
                ),
            );
            request.push_item(METADATA_QUANTITY, row, "1");
            request.push_item(METADATA_UNIT_PRICE, row, price.clone());
            request.push_item(METADATA_EXTENDED_PRICE, row, price);
            request.push_item(METADATA_SPEEDTYPE, row, &config.speedtype);
            request.push_item(METADATA_ACCOUNT, row, &config.account_number);
        }

        request
    }

    fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    fn push_item(&mut self, column: usize, row: usize, value: impl Into<String>) {
        self.push(format!("metadata_item_{},{}", column, row), value);
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits a purchaser name the way the gateway integration always has: on
/// single spaces, first piece and last piece, each URL-escaped. A one-word
/// name has an empty last name.
pub fn split_contact_name(name: &str) -> (String, String) {
    let pieces: Vec<&str> = name.split(' ').collect();
    let first = quote_plus(pieces.first().copied().unwrap_or_default());
    let last = match pieces.as_slice() {
        [_, .., last] => quote_plus(last),
        _ => String::new(),
    };
    (first, last)
}

/// Form-style escaping: spaces become `+`, everything outside
/// `A-Z a-z 0-9 - _ . ~` is percent-encoded.
pub fn quote_plus(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}
