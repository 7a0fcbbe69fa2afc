use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Settlement, SettlementOutcome};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Default, Deserialize)]
struct CallbackForm {
    unique_id: Option<String>,
    amount: Option<String>,
    date_time: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing field '{}'", field))
}

fn parse_settlement(body: &[u8]) -> Result<Settlement, String> {
    let form: CallbackForm =
        serde_urlencoded::from_bytes(body).map_err(|e| format!("malformed body: {}", e))?;

    let unique_id = required(form.unique_id, "unique_id")?;
    let billed_total = required(form.amount, "amount")?;
    let billed_datetime = required(form.date_time, "date_time")?;
    let transaction_id = Uuid::parse_str(&unique_id)
        .map_err(|_| format!("unique_id '{}' is not a transaction id", unique_id))?;

    Ok(Settlement {
        transaction_id,
        billed_total,
        billed_datetime,
    })
}

/// Receives the gateway's settlement notice. The gateway only looks at the
/// status code, so every answer has an empty body.
pub async fn settle_order(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = String::from_utf8_lossy(&body);

    let settlement = match parse_settlement(&body) {
        Ok(settlement) => settlement,
        Err(reason) => {
            tracing::error!(reason = %reason, body = %raw, "Rejected settlement callback");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.store.record_settlement(&settlement).await {
        Ok(SettlementOutcome::Recorded(order)) => {
            tracing::info!(
                transaction_id = %order.transaction_id,
                amount = %settlement.billed_total,
                "Order settled"
            );
            StatusCode::OK.into_response()
        }
        Ok(SettlementOutcome::AlreadyBilled(order)) => {
            tracing::warn!(
                transaction_id = %order.transaction_id,
                body = %raw,
                "Settlement for an order that was already billed, ignored"
            );
            StatusCode::OK.into_response()
        }
        Ok(SettlementOutcome::UnknownTransaction) => {
            tracing::error!(
                transaction_id = %settlement.transaction_id,
                body = %raw,
                "Settlement for an unknown transaction"
            );
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(e) => {
            tracing::error!(body = %raw, "Could not record settlement");
            AppError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_body() {
        let id = Uuid::new_v4();
        let body = format!("unique_id={}&amount=200.00&date_time=2024-05-01+10%3A00%3A00", id);
        let settlement = parse_settlement(body.as_bytes()).unwrap();
        assert_eq!(settlement.transaction_id, id);
        assert_eq!(settlement.billed_total, "200.00");
        assert_eq!(settlement.billed_datetime, "2024-05-01 10:00:00");
    }

    #[test]
    fn test_missing_or_blank_fields() {
        let id = Uuid::new_v4();
        assert!(parse_settlement(format!("unique_id={}&amount=1", id).as_bytes()).is_err());
        assert!(
            parse_settlement(format!("unique_id={}&amount=&date_time=x", id).as_bytes()).is_err()
        );
        assert!(parse_settlement(b"").is_err());
    }

    #[test]
    fn test_unparsable_transaction_id() {
        let err = parse_settlement(b"unique_id=abc&amount=1&date_time=x").unwrap_err();
        assert!(err.contains("abc"));
    }
}
