pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CapacityShortfall, Instructor, NewOrder, Order, Rate, Settlement, SettlementOutcome,
    TallyError, Workshop,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("rate {0} does not exist")]
    UnknownRate(Uuid),

    #[error("rate '{rate}' has only {remaining} ticket(s) remaining")]
    CapacityExceeded { rate: String, remaining: i64 },
}

impl From<CapacityShortfall> for StoreError {
    fn from(shortfall: CapacityShortfall) -> Self {
        StoreError::CapacityExceeded {
            rate: shortfall.rate,
            remaining: shortfall.remaining,
        }
    }
}

impl From<TallyError> for StoreError {
    fn from(err: TallyError) -> Self {
        match err {
            TallyError::UnknownRate(id) => StoreError::UnknownRate(id),
            TallyError::Shortfall(shortfall) => shortfall.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for workshops, rates and committed orders.
#[async_trait]
pub trait Store: Send + Sync {
    /// Public, non-draft workshops ordered by start date.
    async fn public_workshops(&self) -> StoreResult<Vec<Workshop>>;

    /// Unlisted, non-draft workshops unlocked by `code`.
    async fn workshops_by_private_code(&self, code: &str) -> StoreResult<Vec<Workshop>>;

    async fn workshop_by_slug(&self, slug: &str) -> StoreResult<Option<Workshop>>;

    /// All rates of a workshop with their current ticket counts.
    async fn rates_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Rate>>;

    /// Tickets on billed, non-refunded orders across every rate of the workshop.
    async fn tickets_sold(&self, workshop_id: Uuid) -> StoreResult<i64>;

    /// Instructors assigned to the workshop, by name.
    async fn instructors_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Instructor>>;

    /// Persists an order and all of its items in one go.
    ///
    /// The per-rate capacity check runs in the same critical section as the
    /// insert, so two concurrent orders can not both take the last ticket.
    /// Fails with `CapacityExceeded` (and persists nothing) when any rate
    /// would be oversold.
    async fn place_order(&self, order: NewOrder) -> StoreResult<Order>;

    async fn order_by_transaction_id(&self, transaction_id: Uuid) -> StoreResult<Option<Order>>;

    /// Records the gateway's settlement. An order is settled at most once.
    async fn record_settlement(&self, settlement: &Settlement) -> StoreResult<SettlementOutcome>;
}
