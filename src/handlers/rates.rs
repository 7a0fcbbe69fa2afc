use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::{Deserialize, Serialize};

use crate::extractors::Viewer;
use crate::forms::{FormErrors, SelectionForm};
use crate::handlers::{attendees_url, redirect};
use crate::models::{filter_rates, Availability, Instructor, OrderSkeleton, Workshop};
use crate::session::{FlashMessage, Session};
use crate::state::AppState;
use crate::utils::error::{AppError, OptionExt};
use crate::utils::response::{rejected, success};

const SALES_CLOSED: &str = "Ticket sales for this workshop are closed.";
const AT_CAPACITY: &str = "This workshop is at capacity.";

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub rate: Option<String>,
}

#[derive(Serialize)]
struct RatePage {
    workshop: Workshop,
    instructors: Vec<Instructor>,
    purchasable: bool,
    availability: Availability,
    form: SelectionForm,
    messages: Vec<FlashMessage>,
    errors: Option<FormErrors>,
}

/// Everything both rate handlers need about the workshop being viewed.
struct RateContext {
    workshop: Workshop,
    instructors: Vec<Instructor>,
    purchasable: bool,
    availability: Availability,
    form: SelectionForm,
}

impl RateContext {
    fn into_page(self, session: &Session, errors: Option<FormErrors>) -> RatePage {
        RatePage {
            workshop: self.workshop,
            instructors: self.instructors,
            purchasable: self.purchasable,
            availability: self.availability,
            form: self.form,
            messages: session.take_messages(),
            errors,
        }
    }
}

/// Looks up the workshop and the rates on offer for this visit. `None` means
/// the viewer may not see the workshop and belongs back on the catalog.
async fn load(
    state: &AppState,
    slug: &str,
    viewer: Viewer,
    session: &Session,
) -> Result<Option<RateContext>, AppError> {
    let workshop = state
        .store
        .workshop_by_slug(slug)
        .await?
        .or_not_found(format!("Workshop '{}' not found", slug))?;

    if workshop.draft && !viewer.is_staff() {
        tracing::debug!(slug, "Draft workshop hidden from visitor");
        return Ok(None);
    }

    let (private_code, discount_code) =
        session.read(|data| (data.private_code.clone(), data.discount_code.clone()));

    let rates = state.store.rates_for_workshop(workshop.id).await?;
    let offered = filter_rates(&rates, discount_code.as_deref());
    let tickets_sold = state.store.tickets_sold(workshop.id).await?;
    let instructors = state.store.instructors_for_workshop(workshop.id).await?;

    Ok(Some(RateContext {
        purchasable: workshop.is_purchasable_with(private_code.as_deref()),
        availability: workshop.availability(tickets_sold),
        form: SelectionForm::for_rates(&offered),
        workshop,
        instructors,
    }))
}

pub async fn show_rates(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<RateQuery>,
    viewer: Viewer,
    session: Session,
) -> Result<Response, AppError> {
    let discount_code = query
        .rate
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());
    session.update(|data| data.discount_code = discount_code);

    let Some(context) = load(&state, &slug, viewer, &session).await? else {
        return Ok(redirect("/"));
    };

    let page = context.into_page(&session, None);
    Ok(success(page, "Rates").into_response())
}

pub async fn select_rates(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    viewer: Viewer,
    session: Session,
    Form(data): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let Some(context) = load(&state, &slug, viewer, &session).await? else {
        return Ok(redirect("/"));
    };

    if !context.purchasable {
        return Err(AppError::Forbidden(format!(
            "Workshop '{}' requires an access code",
            slug
        )));
    }

    let selection = if !context.availability.open {
        let mut errors = FormErrors::default();
        errors.add_non_field(if context.availability.at_capacity {
            AT_CAPACITY
        } else {
            SALES_CLOSED
        });
        Err(errors)
    } else {
        context.form.validate(&data)
    };

    let selection = match selection {
        Ok(selection) => selection,
        Err(errors) => {
            let page = context.into_page(&session, Some(errors));
            return Ok(rejected(page, "Please correct the errors below."));
        }
    };

    let skeleton = OrderSkeleton::new(
        context.workshop.slug.as_str(),
        selection.contact_name,
        selection.contact_email,
        selection.lines,
    );
    tracing::info!(
        slug = %skeleton.workshop,
        tickets = skeleton.ticket_count(),
        total = %skeleton.order_total,
        "Order started"
    );
    session.update(|data| data.order.start(skeleton));

    Ok(redirect(&attendees_url(&slug)))
}
