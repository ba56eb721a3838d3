use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::credentials;
use crate::error::UpayError;
use crate::payment_request;
use crate::repo::{PaymentStatus, SubmissionRecord};
use crate::slug;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub form_id: i64,
    pub entry_id: i64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// The form does not take payments; nothing was written.
    Skipped,
    /// Nothing to pay; the entry is marked `N/A`.
    NoPaymentDue,
    /// Entry is `Pending`; the shopper continues at `template_url`.
    PaymentRequired { payment_request_number: String, template_url: String },
}

/// `POST /ubc-upay/submissions`
pub async fn create_submission(
    State(state): State<AppState>,
    Json(req): Json<SubmissionRequest>,
) -> Result<Json<SubmissionOutcome>, UpayError> {
    submit(&state, req.form_id, req.entry_id).await.map(Json)
}

/// Put a fresh form submission into the payment flow.
pub async fn submit(state: &AppState, form_id: i64, entry_id: i64) -> Result<SubmissionOutcome, UpayError> {
    let form = state.forms.get_form(form_id).await?.ok_or(UpayError::UnknownForm(form_id))?;
    let entry = state
        .entries
        .get_entry(entry_id)
        .await?
        .filter(|e| e.form_id == form_id)
        .ok_or(UpayError::UnknownEntry(entry_id))?;
    if !form.is_payment_form() {
        debug!(form_id, "form is not a payment form; submission skipped");
        return Ok(SubmissionOutcome::Skipped);
    }

    let total = state.entries.order_total(&form, &entry).await?;
    if total.is_zero() {
        let record = SubmissionRecord {
            payment_request_number: PaymentStatus::NotApplicable.as_str().to_string(),
            status: PaymentStatus::NotApplicable,
            amount: BigDecimal::zero(),
            environment: None,
        };
        state.entries.record_submission(entry.id, &record).await?;
        info!(form_id, entry_id, "order total is zero; no payment requested");
        return Ok(SubmissionOutcome::NoPaymentDue);
    }

    let payment_request_number =
        slug::payment_request_number(&state.config.request_prefix, state.config.site_id, form.id, entry.id);
    let record = SubmissionRecord {
        payment_request_number: payment_request_number.clone(),
        status: PaymentStatus::Pending,
        amount: total,
        environment: Some(credentials::resolve_environment(&state.settings, &form)),
    };
    state.entries.record_submission(entry.id, &record).await?;
    info!(form_id, entry_id, %payment_request_number, amount = %record.amount, "payment pending");

    let template_url = format!(
        "{}/ubc-upay-template?payment_request_number={}&form_id={}",
        state.config.site_url.trim_end_matches('/'),
        urlencoding::encode(&payment_request_number),
        form.id
    );
    Ok(SubmissionOutcome::PaymentRequired { payment_request_number, template_url })
}

/// `GET /ubc-upay-template?payment_request_number=&form_id=`
///
/// Posts the signed request and hands the gateway's page back to the shopper.
pub async fn payment_template(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, UpayError> {
    let raw_number = params
        .get("payment_request_number")
        .ok_or(UpayError::MissingParameter("payment_request_number"))?;
    let form_id = params
        .get("form_id")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(UpayError::MissingParameter("form_id"))?;

    let payment_request_number = slug::sanitize_title(raw_number);
    let entry = state
        .entries
        .find_by_request_number(&payment_request_number)
        .await?
        .ok_or(UpayError::EntryNotFound)?;
    if entry.form_id != form_id {
        debug!(form_id, entry_form_id = entry.form_id, %payment_request_number, "template form does not own the entry");
        return Err(UpayError::FormMismatch { form_id, entry_id: entry.id });
    }
    let form = state.forms.get_form(form_id).await?.ok_or(UpayError::UnknownForm(form_id))?;
    if !form.is_payment_form() {
        return Err(UpayError::NotPaymentForm);
    }
    if entry.payment_status != Some(PaymentStatus::Pending) {
        return Err(UpayError::PaymentNotPending {
            payment_request_number,
            status: entry.payment_status.map(|s| s.as_str()).unwrap_or("none"),
        });
    }
    let amount = entry.payment_amount.ok_or(UpayError::AmountMissing(entry.id))?;

    let response = payment_request::build_and_send(&state, &form, &amount, &payment_request_number).await?;
    Ok(Html(response.body))
}
