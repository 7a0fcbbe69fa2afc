use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::forms::{required_email, required_text, FormErrors};
use crate::models::{OrderSkeleton, TicketDraft};

pub const TOTAL_FORMS: &str = "form-TOTAL_FORMS";
pub const DUPLICATE_EMAIL: &str = "Tickets must have a unique email address.";
const TAMPERED: &str = "Form data is missing or has been tampered with.";

/// One attendee subform, bound to a single ticket of a rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendeeSlot {
    pub index: usize,
    pub rate_id: Uuid,
    pub rate_name: String,
    pub name: String,
    pub email: String,
}

impl AttendeeSlot {
    pub fn key(&self, field: &str) -> String {
        format!("form-{}-{}", self.index, field)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendeeFormSet {
    total_forms: usize,
    slots: Vec<AttendeeSlot>,
}

impl AttendeeFormSet {
    /// One slot per ticket in the skeleton. Previously entered attendees
    /// fill their slots again as long as they still line up with the rates.
    pub fn from_skeleton(skeleton: &OrderSkeleton, existing: Option<&[TicketDraft]>) -> Self {
        let slots: Vec<AttendeeSlot> = skeleton
            .ticket_slots()
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let prior = existing
                    .and_then(|tickets| tickets.get(index))
                    .filter(|ticket| ticket.rate_id == line.rate_id);
                AttendeeSlot {
                    index,
                    rate_id: line.rate_id,
                    rate_name: line.name.clone(),
                    name: prior.map(|t| t.name.clone()).unwrap_or_default(),
                    email: prior.map(|t| t.email.clone()).unwrap_or_default(),
                }
            })
            .collect();

        Self {
            total_forms: slots.len(),
            slots,
        }
    }

    pub fn slots(&self) -> &[AttendeeSlot] {
        &self.slots
    }

    pub fn validate(&self, data: &HashMap<String, String>) -> Result<Vec<TicketDraft>, FormErrors> {
        let mut errors = FormErrors::default();

        let posted_total = data
            .get(TOTAL_FORMS)
            .and_then(|value| value.trim().parse::<usize>().ok());
        if posted_total != Some(self.total_forms) {
            errors.add_non_field(TAMPERED);
            return Err(errors);
        }

        let mut tickets = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let rate_key = slot.key("rate");
            let rate_matches = data
                .get(&rate_key)
                .and_then(|value| Uuid::parse_str(value.trim()).ok())
                == Some(slot.rate_id);
            if !rate_matches {
                errors.add(rate_key, "Select a valid choice.");
            }

            let name = required_text(data, &slot.key("name"), &mut errors);
            let email = required_email(data, &slot.key("email"), &mut errors);
            if let (true, Some(name), Some(email)) = (rate_matches, name, email) {
                tickets.push(TicketDraft {
                    rate_id: slot.rate_id,
                    name,
                    email,
                });
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut seen = HashSet::new();
        if !tickets.iter().all(|ticket| seen.insert(ticket.email.as_str())) {
            errors.add_non_field(DUPLICATE_EMAIL);
        }

        errors.into_result(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateLine;

    fn skeleton() -> OrderSkeleton {
        let line = |name: &str, quantity| RateLine {
            rate_id: Uuid::new_v4(),
            name: name.to_string(),
            price: "50.00".parse().unwrap(),
            quantity,
        };
        OrderSkeleton::new(
            "intro-2024",
            "Jane Doe",
            "jane@example.com",
            vec![line("standard", 2), line("student", 1)],
        )
    }

    fn post(formset: &AttendeeFormSet, people: &[(&str, &str)]) -> HashMap<String, String> {
        let mut data = HashMap::new();
        data.insert(TOTAL_FORMS.to_string(), people.len().to_string());
        for (slot, (name, email)) in formset.slots().iter().zip(people) {
            data.insert(slot.key("rate"), slot.rate_id.to_string());
            data.insert(slot.key("name"), name.to_string());
            data.insert(slot.key("email"), email.to_string());
        }
        data
    }

    #[test]
    fn test_one_slot_per_ticket() {
        let skeleton = skeleton();
        let formset = AttendeeFormSet::from_skeleton(&skeleton, None);
        let rates: Vec<&str> = formset
            .slots()
            .iter()
            .map(|slot| slot.rate_name.as_str())
            .collect();
        assert_eq!(rates, ["standard", "standard", "student"]);
        assert_eq!(formset.slots()[2].key("email"), "form-2-email");
    }

    #[test]
    fn test_valid_formset() {
        let formset = AttendeeFormSet::from_skeleton(&skeleton(), None);
        let tickets = formset
            .validate(&post(
                &formset,
                &[("Ann", "ann@example.com"), ("Bo", "bo@example.com"), ("Cy", "cy@example.com")],
            ))
            .unwrap();
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets[2].rate_id, formset.slots()[2].rate_id);
    }

    #[test]
    fn test_duplicate_emails() {
        let formset = AttendeeFormSet::from_skeleton(&skeleton(), None);
        let errors = formset
            .validate(&post(
                &formset,
                &[("Ann", "ann@example.com"), ("Bo", "ann@example.com"), ("Cy", "cy@example.com")],
            ))
            .unwrap_err();
        assert_eq!(errors.non_field, [DUPLICATE_EMAIL]);
    }

    #[test]
    fn test_wrong_form_count() {
        let formset = AttendeeFormSet::from_skeleton(&skeleton(), None);
        let errors = formset
            .validate(&post(&formset, &[("Ann", "ann@example.com")]))
            .unwrap_err();
        assert_eq!(errors.non_field.len(), 1);
    }

    #[test]
    fn test_swapped_rate_is_rejected() {
        let formset = AttendeeFormSet::from_skeleton(&skeleton(), None);
        let mut data = post(
            &formset,
            &[("Ann", "ann@example.com"), ("Bo", "bo@example.com"), ("Cy", "cy@example.com")],
        );
        data.insert("form-0-rate".to_string(), formset.slots()[2].rate_id.to_string());
        let errors = formset.validate(&data).unwrap_err();
        assert!(errors.has_field("form-0-rate"));
    }

    #[test]
    fn test_prefill_from_earlier_entry() {
        let skeleton = skeleton();
        let formset = AttendeeFormSet::from_skeleton(&skeleton, None);
        let tickets = formset
            .validate(&post(
                &formset,
                &[("Ann", "ann@example.com"), ("Bo", "bo@example.com"), ("Cy", "cy@example.com")],
            ))
            .unwrap();

        let again = AttendeeFormSet::from_skeleton(&skeleton, Some(&tickets));
        assert_eq!(again.slots()[1].name, "Bo");
        assert_eq!(again.slots()[2].email, "cy@example.com");
    }
}
