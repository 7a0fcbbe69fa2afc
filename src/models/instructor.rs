use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A person teaching at one or more workshops. Instructors may exist before
/// they are assigned to any workshop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Instructor {
    pub id: Uuid,
    pub name: String,
}
