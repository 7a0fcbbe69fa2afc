use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workshop {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub url: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Drafts are hidden from the catalog and only staff may open them.
    pub draft: bool,
    /// Non-public workshops are unlocked with `private_code`.
    pub public: bool,
    #[serde(skip_serializing)]
    pub private_code: String,
    pub capacity: i32,
    pub sales_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workshop {
    /// Public workshops are always purchasable; private ones only with the
    /// access code the viewer unlocked earlier in their session.
    pub fn is_purchasable_with(&self, private_code: Option<&str>) -> bool {
        self.public || private_code == Some(self.private_code.as_str())
    }

    pub fn availability(&self, tickets_sold: i64) -> Availability {
        let at_capacity = tickets_sold >= i64::from(self.capacity);
        Availability {
            tickets_sold,
            at_capacity,
            open: self.sales_open && !at_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub tickets_sold: i64,
    pub at_capacity: bool,
    pub open: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkshop {
    pub slug: String,
    pub title: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub draft: bool,
    #[serde(default = "default_public")]
    pub public: bool,
    #[serde(default)]
    pub private_code: Option<String>,
    pub capacity: i32,
    #[serde(default)]
    pub sales_open: bool,
}

fn default_public() -> bool {
    true
}

impl NewWorkshop {
    /// Checks the workshop before it is stored and fills in a private code when
    /// none was given.
    pub fn validate(mut self) -> Result<Self, String> {
        if !is_slug(&self.slug) {
            return Err(format!(
                "'{}' is not a valid slug (letters, numbers, underscores or hyphens)",
                self.slug
            ));
        }
        if self.start_date > self.end_date {
            return Err("A Workshop's start date must be before the end date.".to_string());
        }
        if self.capacity < 0 {
            return Err("Capacity can not be negative.".to_string());
        }
        match self.private_code.as_deref() {
            Some(code) if !is_slug(code) => {
                return Err(format!("'{}' is not a valid private code", code));
            }
            Some(_) => {}
            None => self.private_code = Some(Uuid::new_v4().to_string()),
        }
        Ok(self)
    }
}

pub(crate) fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
