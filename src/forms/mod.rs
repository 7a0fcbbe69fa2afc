//! Validation for the two checkout forms. Both collect every problem they
//! find so the page can show them all at once.

pub mod attendees;
pub mod selection;

pub use attendees::{AttendeeFormSet, AttendeeSlot};
pub use selection::{QuantityField, Selection, SelectionForm};

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    /// Messages keyed by the posted field name.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Messages about the form as a whole.
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the errors.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// A required text value, trimmed. Records an error and returns `None` when
/// it is missing or blank.
pub(crate) fn required_text(
    data: &HashMap<String, String>,
    key: &str,
    errors: &mut FormErrors,
) -> Option<String> {
    match data.get(key).map(|value| value.trim()) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => {
            errors.add(key, REQUIRED);
            None
        }
    }
}

/// A required email address, trimmed and checked for a plausible shape.
pub(crate) fn required_email(
    data: &HashMap<String, String>,
    key: &str,
    errors: &mut FormErrors,
) -> Option<String> {
    let email = required_text(data, key, errors)?;
    if is_valid_email(&email) {
        Some(email)
    } else {
        errors.add(key, INVALID_EMAIL);
        None
    }
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain
/// whose labels are non-empty.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty() && !label.starts_with('-') && !label.ends_with('-')
    })
}
