use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use common_http_errors::ApiError;
use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

use crate::error::UpayError;
use crate::merge_tags::MergeContext;
use crate::repo::Entry;
use crate::settings::{ConfirmationKind, Form};
use crate::slug::sanitize_title;
use crate::AppState;

const NONCE_ACTION: &str = "ubc-upay-confirmation-redirect";
/// Query keys added to the form page when the shopper comes back.
const RETURN_KEYS: [&str; 5] = ["form_id", "entry_id", "payment_request_number", "upay_status", "_nonce"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success,
    Error,
    Cancelled,
}

impl RedirectOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectOutcome::Success => "success",
            RedirectOutcome::Error => "error",
            RedirectOutcome::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<RedirectOutcome> {
        match s {
            "success" => Some(RedirectOutcome::Success),
            "error" => Some(RedirectOutcome::Error),
            "cancelled" => Some(RedirectOutcome::Cancelled),
            _ => None,
        }
    }
}

/// The nonce binds the whole return link, not just the action name.
pub fn confirmation_action(form_id: &str, entry_id: &str, payment_request_number: &str, status: &str) -> String {
    format!("{NONCE_ACTION}|{form_id}|{entry_id}|{payment_request_number}|{status}")
}

/// `GET /ubc-epayment/{success|error|cancelled}?EXT_TRANS_ID=&UPAY_SITE_ID=`
pub async fn gateway_return(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, UpayError> {
    let outcome = RedirectOutcome::from_str(&segment).ok_or(UpayError::UnknownRedirect(segment))?;
    let (Some(ext_trans_id), Some(_site_id)) = (params.get("EXT_TRANS_ID"), params.get("UPAY_SITE_ID")) else {
        return Err(UpayError::RedirectForbidden);
    };
    let payment_request_number = sanitize_title(ext_trans_id);
    match resolve_return(&state, &payment_request_number, outcome).await {
        Ok(location) => {
            state.metrics.confirmation_redirects_total.with_label_values(&[outcome.as_str()]).inc();
            info!(%payment_request_number, outcome = outcome.as_str(), "redirecting returning shopper");
            Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
        }
        Err(UpayError::NotPaymentForm) => {
            Ok(ApiError::NotFound { code: "not_payment_form", trace_id: None }.into_response())
        }
        Err(err) => Err(err),
    }
}

/// Where a returning shopper should land.
///
/// Message confirmations, cancellations and errors go back to the form page with
/// a signed return link; a successful payment with a page or redirect
/// confirmation goes straight there.
pub async fn resolve_return(
    state: &AppState,
    payment_request_number: &str,
    outcome: RedirectOutcome,
) -> Result<String, UpayError> {
    let entry = state
        .entries
        .find_by_request_number(payment_request_number)
        .await?
        .ok_or(UpayError::EntryNotFound)?;
    let form = state
        .forms
        .get_form(entry.form_id)
        .await?
        .filter(|f| f.is_payment_form())
        .ok_or(UpayError::NotPaymentForm)?;
    let confirmation = form
        .default_confirmation()
        .ok_or(UpayError::ConfirmationMisconfigured(form.id))?;

    if confirmation.kind == ConfirmationKind::Message || outcome != RedirectOutcome::Success {
        return return_link(state, &form, &entry, payment_request_number, outcome);
    }
    match confirmation.kind {
        ConfirmationKind::Page => confirmation
            .page_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or(UpayError::ConfirmationMisconfigured(form.id)),
        ConfirmationKind::Redirect => {
            let url = confirmation
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or(UpayError::ConfirmationMisconfigured(form.id))?;
            let query = confirmation.query_string.as_deref().map(str::trim).unwrap_or_default();
            if query.is_empty() {
                return Ok(url.to_string());
            }
            let ctx = MergeContext::new(&form, &entry, Utc::now().date_naive());
            Ok(append_query(url, &ctx.render_query(query)))
        }
        ConfirmationKind::Message => return_link(state, &form, &entry, payment_request_number, outcome),
    }
}

/// Join a rendered query onto a URL that may already carry one.
fn append_query(url: &str, query: &str) -> String {
    let query = query.trim_start_matches(['?', '&']);
    let separator = match url.find('?') {
        None => "?",
        Some(i) if i + 1 == url.len() || url.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{url}{separator}{query}")
}

fn return_link(
    state: &AppState,
    form: &Form,
    entry: &Entry,
    payment_request_number: &str,
    outcome: RedirectOutcome,
) -> Result<String, UpayError> {
    let form_id = form.id.to_string();
    let entry_id = entry.id.to_string();
    let action = confirmation_action(&form_id, &entry_id, payment_request_number, outcome.as_str());
    let nonce = state.nonce.issue(&action, Utc::now().timestamp())?;

    let mut url = Url::parse(entry.source_url.trim())
        .or_else(|_| Url::parse(&state.config.site_url))
        .map_err(|_| UpayError::ConfirmationMisconfigured(form.id))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !RETURN_KEYS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("form_id", &form_id)
        .append_pair("entry_id", &entry_id)
        .append_pair("payment_request_number", payment_request_number)
        .append_pair("upay_status", outcome.as_str())
        .append_pair("_nonce", &nonce);
    Ok(url.into())
}

/// `GET /ubc-epayment/confirmation?form_id=&entry_id=&payment_request_number=&upay_status=&_nonce=`
///
/// 200 with the confirmation HTML, or 204 when the page should render its own content.
pub async fn confirmation_content(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, UpayError> {
    Ok(match render_confirmation(&state, &params).await? {
        Some(html) => Html(html).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// The message to show in place of the form page content, if any.
pub async fn render_confirmation(state: &AppState, params: &HashMap<String, String>) -> Result<Option<String>, UpayError> {
    let fields: Option<Vec<&str>> = RETURN_KEYS.iter().map(|k| params.get(*k).map(String::as_str)).collect();
    let Some([form_id, entry_id, raw_number, status, nonce]) = fields.as_deref() else {
        return Ok(None);
    };
    let action = confirmation_action(form_id, entry_id, raw_number, status);
    if !state.nonce.verify(&action, nonce, Utc::now().timestamp()) {
        debug!(form_id, entry_id, "confirmation nonce rejected");
        return Ok(None);
    }
    let (Ok(form_id), Ok(entry_id)) = (form_id.parse::<i64>(), entry_id.parse::<i64>()) else {
        return Ok(None);
    };
    let Some(form) = state.forms.get_form(form_id).await?.filter(|f| f.is_payment_form()) else {
        return Ok(None);
    };
    let payment_request_number = sanitize_title(raw_number);

    let message = match RedirectOutcome::from_str(status) {
        Some(RedirectOutcome::Success) => {
            let Some(entry) = state.entries.get_entry(entry_id).await? else {
                return Ok(None);
            };
            let Some(confirmation) = form.default_confirmation() else {
                return Ok(None);
            };
            MergeContext::new(&form, &entry, Utc::now().date_naive()).render_html(&confirmation.message)
        }
        Some(RedirectOutcome::Cancelled) => format!("Your payment ({payment_request_number}) has been cancelled."),
        Some(RedirectOutcome::Error) => format!(
            "Your payment ({payment_request_number}) is not complete due to system outages or other unexpected technical issues with payment processing. Please contact UBC uPay team for more details."
        ),
        None => return Ok(None),
    };
    Ok(Some(message))
}
