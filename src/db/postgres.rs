use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::{Store, StoreError, StoreResult};
use crate::models::rate::check_tally;
use crate::models::{Instructor, NewOrder, Order, Rate, Settlement, SettlementOutcome, Workshop};

const WORKSHOP_COLUMNS: &str = "id, slug, title, location, description, url, start_date, \
     end_date, draft, public, private_code, capacity, sales_open, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, transaction_id, contact_name, contact_email, order_total, \
     order_datetime, billed_total, billed_datetime, refunded";

// Refunded orders give their tickets back.
const RATE_SELECT: &str = "SELECT r.id, r.workshop_id, r.name, r.price, r.capacity, r.discount, \
     r.discount_code, COUNT(oi.id) FILTER (WHERE NOT o.refunded) AS ticket_count \
     FROM rates r \
     LEFT JOIN order_items oi ON oi.rate_id = r.id \
     LEFT JOIN orders o ON o.id = oi.order_id";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the rate rows of an order for the rest of the transaction and
    /// returns them with fresh ticket counts.
    async fn lock_rates(
        tx: &mut Transaction<'_, Postgres>,
        rate_ids: &[Uuid],
    ) -> StoreResult<BTreeMap<Uuid, Rate>> {
        // Consistent lock order keeps concurrent submissions from deadlocking.
        sqlx::query("SELECT id FROM rates WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(rate_ids)
            .execute(&mut **tx)
            .await?;

        let rates: Vec<Rate> = sqlx::query_as(&format!(
            "{RATE_SELECT} WHERE r.id = ANY($1) GROUP BY r.id"
        ))
        .bind(rate_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rates.into_iter().map(|rate| (rate.id, rate)).collect())
    }
}

fn map_unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(message()),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn public_workshops(&self) -> StoreResult<Vec<Workshop>> {
        let workshops = sqlx::query_as(&format!(
            "SELECT {WORKSHOP_COLUMNS} FROM workshops \
             WHERE public AND NOT draft ORDER BY start_date, title"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(workshops)
    }

    async fn workshops_by_private_code(&self, code: &str) -> StoreResult<Vec<Workshop>> {
        let workshops = sqlx::query_as(&format!(
            "SELECT {WORKSHOP_COLUMNS} FROM workshops \
             WHERE private_code = $1 AND NOT public AND NOT draft ORDER BY start_date, title"
        ))
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(workshops)
    }

    async fn workshop_by_slug(&self, slug: &str) -> StoreResult<Option<Workshop>> {
        let workshop = sqlx::query_as(&format!(
            "SELECT {WORKSHOP_COLUMNS} FROM workshops WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(workshop)
    }

    async fn rates_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Rate>> {
        let rates = sqlx::query_as(&format!(
            "{RATE_SELECT} WHERE r.workshop_id = $1 GROUP BY r.id ORDER BY r.price, r.name"
        ))
        .bind(workshop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rates)
    }

    async fn tickets_sold(&self, workshop_id: Uuid) -> StoreResult<i64> {
        let sold: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_items oi \
             JOIN orders o ON o.id = oi.order_id \
             JOIN rates r ON r.id = oi.rate_id \
             WHERE r.workshop_id = $1 AND o.billed_total IS NOT NULL AND NOT o.refunded",
        )
        .bind(workshop_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sold)
    }

    async fn instructors_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Instructor>> {
        let instructors = sqlx::query_as(
            "SELECT i.id, i.name FROM instructors i \
             JOIN workshop_instructors wi ON wi.instructor_id = i.id \
             WHERE wi.workshop_id = $1 ORDER BY i.name",
        )
        .bind(workshop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(instructors)
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<Order> {
        let tally = order.tally();
        let rate_ids: Vec<Uuid> = tally.keys().copied().collect();

        let mut tx = self.pool.begin().await?;
        let rates = Self::lock_rates(&mut tx, &rate_ids).await?;
        // Returning early drops `tx`, which rolls it back.
        check_tally(&tally, &rates)?;

        let created: Order = sqlx::query_as(&format!(
            "INSERT INTO orders (id, transaction_id, contact_name, contact_email, order_total) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .bind(&order.contact_name)
        .bind(&order.contact_email)
        .bind(order.order_total)
        .fetch_one(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = order.items.iter().map(|_| Uuid::new_v4()).collect();
        let item_rates: Vec<Uuid> = order.items.iter().map(|item| item.rate_id).collect();
        let names: Vec<String> = order.items.iter().map(|item| item.name.clone()).collect();
        let emails: Vec<String> = order.items.iter().map(|item| item.email.clone()).collect();

        sqlx::query(
            "INSERT INTO order_items (id, order_id, rate_id, name, email) \
             SELECT item.id, $2, item.rate_id, item.name, item.email \
             FROM UNNEST($1::UUID[], $3::UUID[], $4::TEXT[], $5::TEXT[]) \
             AS item(id, rate_id, name, email)",
        )
        .bind(&ids)
        .bind(created.id)
        .bind(&item_rates)
        .bind(&names)
        .bind(&emails)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                "An attendee holds more than one ticket at the same rate".to_string()
            })
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn order_by_transaction_id(&self, transaction_id: Uuid) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn record_settlement(&self, settlement: &Settlement) -> StoreResult<SettlementOutcome> {
        let updated: Option<Order> = sqlx::query_as(&format!(
            "UPDATE orders SET billed_total = $2, billed_datetime = $3 \
             WHERE transaction_id = $1 AND billed_total IS NULL RETURNING {ORDER_COLUMNS}"
        ))
        .bind(settlement.transaction_id)
        .bind(&settlement.billed_total)
        .bind(&settlement.billed_datetime)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(order) = updated {
            return Ok(SettlementOutcome::Recorded(order));
        }

        Ok(match self.order_by_transaction_id(settlement.transaction_id).await? {
            Some(order) => SettlementOutcome::AlreadyBilled(order),
            None => SettlementOutcome::UnknownTransaction,
        })
    }
}
