use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{Store, StoreError, StoreResult};
use crate::models::rate::check_tally;
use crate::models::{
    Instructor, NewOrder, NewRate, NewWorkshop, Order, OrderItem, Rate, Settlement,
    SettlementOutcome, Workshop,
};

#[derive(Default)]
struct Tables {
    workshops: Vec<Workshop>,
    rates: Vec<Rate>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    instructors: Vec<Instructor>,
    // (instructor, workshop)
    teaching: Vec<(Uuid, Uuid)>,
}

impl Tables {
    fn ticket_count(&self, rate_id: Uuid) -> i64 {
        self.items
            .iter()
            .filter(|item| item.rate_id == rate_id)
            .filter(|item| !self.order(item.order_id).is_some_and(|order| order.refunded))
            .count() as i64
    }

    fn order(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == order_id)
    }

    fn with_count(&self, rate: &Rate) -> Rate {
        Rate {
            ticket_count: self.ticket_count(rate.id),
            ..rate.clone()
        }
    }
}

/// Keeps everything in process memory. Used by the test-suite and for local
/// runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a workshop after validating it. Workshops are managed outside the
    /// checkout, so this seeds local runs and tests.
    pub async fn create_workshop(&self, workshop: NewWorkshop) -> StoreResult<Workshop> {
        let workshop = workshop.validate().map_err(StoreError::Invalid)?;
        let mut tables = self.tables.write().await;
        if tables.workshops.iter().any(|w| w.slug == workshop.slug) {
            return Err(StoreError::Duplicate(format!(
                "A workshop with slug '{}' already exists",
                workshop.slug
            )));
        }

        let now = Utc::now();
        let created = Workshop {
            id: Uuid::new_v4(),
            slug: workshop.slug,
            title: workshop.title,
            location: workshop.location,
            description: workshop.description,
            url: workshop.url,
            start_date: workshop.start_date,
            end_date: workshop.end_date,
            draft: workshop.draft,
            public: workshop.public,
            private_code: workshop.private_code.unwrap_or_default(),
            capacity: workshop.capacity,
            sales_open: workshop.sales_open,
            created_at: now,
            updated_at: now,
        };
        tables.workshops.push(created.clone());
        Ok(created)
    }

    pub async fn create_rate(&self, rate: NewRate) -> StoreResult<Rate> {
        let rate = rate.validate().map_err(StoreError::Invalid)?;
        let mut tables = self.tables.write().await;
        if !tables.workshops.iter().any(|w| w.id == rate.workshop_id) {
            return Err(StoreError::Invalid(format!(
                "Workshop '{}' does not exist",
                rate.workshop_id
            )));
        }
        if let Some(code) = &rate.discount_code {
            if tables
                .rates
                .iter()
                .any(|r| r.discount_code.as_ref() == Some(code))
            {
                return Err(StoreError::Duplicate(format!(
                    "Discount codes must be unique. The code {} is already in use.",
                    code
                )));
            }
        }

        let created = Rate {
            id: Uuid::new_v4(),
            workshop_id: rate.workshop_id,
            name: rate.name,
            price: rate.price,
            capacity: rate.capacity,
            discount: rate.discount,
            discount_code: rate.discount_code,
            ticket_count: 0,
        };
        tables.rates.push(created.clone());
        Ok(created)
    }

    /// Adds an instructor teaching at the given workshops.
    pub async fn add_instructor(&self, name: &str, workshops: &[Uuid]) -> Instructor {
        let instructor = Instructor {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        let mut tables = self.tables.write().await;
        tables
            .teaching
            .extend(workshops.iter().map(|workshop_id| (instructor.id, *workshop_id)));
        tables.instructors.push(instructor.clone());
        instructor
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.clone()
    }

    pub async fn all_order_items(&self) -> Vec<OrderItem> {
        self.tables.read().await.items.clone()
    }

    pub async fn set_refunded(&self, order_id: Uuid, refunded: bool) -> bool {
        let mut tables = self.tables.write().await;
        match tables.orders.iter_mut().find(|order| order.id == order_id) {
            Some(order) => {
                order.refunded = refunded;
                true
            }
            None => false,
        }
    }
}

fn sorted_workshops(mut workshops: Vec<Workshop>) -> Vec<Workshop> {
    workshops.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.title.cmp(&b.title))
    });
    workshops
}

#[async_trait]
impl Store for MemoryStore {
    async fn public_workshops(&self) -> StoreResult<Vec<Workshop>> {
        let tables = self.tables.read().await;
        let workshops = tables
            .workshops
            .iter()
            .filter(|w| w.public && !w.draft)
            .cloned()
            .collect();
        Ok(sorted_workshops(workshops))
    }

    async fn workshops_by_private_code(&self, code: &str) -> StoreResult<Vec<Workshop>> {
        let tables = self.tables.read().await;
        let workshops = tables
            .workshops
            .iter()
            .filter(|w| !w.public && !w.draft && w.private_code == code)
            .cloned()
            .collect();
        Ok(sorted_workshops(workshops))
    }

    async fn workshop_by_slug(&self, slug: &str) -> StoreResult<Option<Workshop>> {
        let tables = self.tables.read().await;
        Ok(tables.workshops.iter().find(|w| w.slug == slug).cloned())
    }

    async fn rates_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Rate>> {
        let tables = self.tables.read().await;
        let mut rates: Vec<Rate> = tables
            .rates
            .iter()
            .filter(|rate| rate.workshop_id == workshop_id)
            .map(|rate| tables.with_count(rate))
            .collect();
        rates.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(rates)
    }

    async fn tickets_sold(&self, workshop_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        let rate_ids: HashSet<Uuid> = tables
            .rates
            .iter()
            .filter(|rate| rate.workshop_id == workshop_id)
            .map(|rate| rate.id)
            .collect();
        let sold = tables
            .items
            .iter()
            .filter(|item| rate_ids.contains(&item.rate_id))
            .filter(|item| {
                tables
                    .order(item.order_id)
                    .is_some_and(|order| order.is_billed() && !order.refunded)
            })
            .count();
        Ok(sold as i64)
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<Order> {
        // One write guard covers the capacity check and the inserts.
        let mut tables = self.tables.write().await;

        let tally = order.tally();
        let rates: BTreeMap<Uuid, Rate> = tables
            .rates
            .iter()
            .filter(|rate| tally.contains_key(&rate.id))
            .map(|rate| (rate.id, tables.with_count(rate)))
            .collect();
        check_tally(&tally, &rates)?;

        let mut seen = HashSet::new();
        for item in &order.items {
            if !seen.insert((item.rate_id, item.email.as_str())) {
                return Err(StoreError::Duplicate(format!(
                    "{} holds more than one ticket at the same rate",
                    item.email
                )));
            }
        }

        let created = Order {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            contact_name: order.contact_name,
            contact_email: order.contact_email,
            order_total: order.order_total,
            order_datetime: Utc::now(),
            billed_total: None,
            billed_datetime: None,
            refunded: false,
        };
        let items = order.items.into_iter().map(|item| OrderItem {
            id: Uuid::new_v4(),
            order_id: created.id,
            rate_id: item.rate_id,
            name: item.name,
            email: item.email,
        });

        tables.items.extend(items);
        tables.orders.push(created.clone());
        Ok(created)
    }

    async fn instructors_for_workshop(&self, workshop_id: Uuid) -> StoreResult<Vec<Instructor>> {
        let tables = self.tables.read().await;
        let mut instructors: Vec<Instructor> = tables
            .instructors
            .iter()
            .filter(|instructor| tables.teaching.contains(&(instructor.id, workshop_id)))
            .cloned()
            .collect();
        instructors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instructors)
    }

    async fn order_by_transaction_id(&self, transaction_id: Uuid) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|order| order.transaction_id == transaction_id)
            .cloned())
    }

    async fn record_settlement(&self, settlement: &Settlement) -> StoreResult<SettlementOutcome> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|order| order.transaction_id == settlement.transaction_id)
        else {
            return Ok(SettlementOutcome::UnknownTransaction);
        };

        if order.is_billed() {
            return Ok(SettlementOutcome::AlreadyBilled(order.clone()));
        }

        order.billed_total = Some(settlement.billed_total.clone());
        order.billed_datetime = Some(settlement.billed_datetime.clone());
        Ok(SettlementOutcome::Recorded(order.clone()))
    }
}
