use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use common_audit::LogSeverity;
use common_money::{normalize_scale, parse_lenient};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::credentials;
use crate::error::UpayError;
use crate::repo::PaymentStatus;
use crate::slug::sanitize_title;
use crate::AppState;

/// Gateway parameter name to entry metadata key.
const META_FIELDS: &[(&str, &str)] = &[
    ("paymentType", "payment_type"),
    ("paymentCardType", "payment_card_type"),
    ("uPayTrackingId", "upay_tracking_id"),
    ("paymentGatewayReferenceNumber", "payment_gateway_reference_number"),
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Flattened notification parameters. Body values override query values.
#[derive(Debug, Clone, Default)]
pub struct WebhookParams(HashMap<String, String>);

impl WebhookParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// Merge query parameters with a JSON or form-encoded body.
    pub fn from_request(query: HashMap<String, String>, content_type: Option<&str>, body: &[u8]) -> Result<Self, UpayError> {
        let mut params = query;
        let is_json = content_type.map(|ct| ct.contains("json")).unwrap_or(false)
            || body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
        if is_json {
            let parsed: Value = serde_json::from_slice(body).map_err(|_| UpayError::MalformedBody)?;
            let Value::Object(map) = parsed else {
                return Err(UpayError::MalformedBody);
            };
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                params.insert(key, value);
            }
        } else {
            for (key, value) in url::form_urlencoded::parse(body) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }
        Ok(Self(params))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn as_json(&self) -> Value {
        let redacted: BTreeMap<&str, &str> = self
            .0
            .iter()
            .map(|(k, v)| if k == "merchantUpdateSecret" { (k.as_str(), "***") } else { (k.as_str(), v.as_str()) })
            .collect();
        json!(redacted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Paid { payment_request_number: String },
    Cancelled { payment_request_number: String },
}

impl WebhookOutcome {
    pub fn payment_request_number(&self) -> &str {
        match self {
            WebhookOutcome::Paid { payment_request_number } | WebhookOutcome::Cancelled { payment_request_number } => {
                payment_request_number
            }
        }
    }
}

/// `POST /wp-json/ubc/v1/epayments-upay`
pub async fn status_update(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, UpayError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let params = WebhookParams::from_request(query, content_type, &body)?;
    let result = apply_status_update(&state, &params).await;
    let label = match &result {
        Ok(WebhookOutcome::Paid { .. }) => "paid",
        Ok(WebhookOutcome::Cancelled { .. }) => "cancelled",
        Err(err) => err.code(),
    };
    state.metrics.webhook_events_total.with_label_values(&[label]).inc();
    let outcome = result?;
    Ok(Json(json!({ "payment_request_number": outcome.payment_request_number() })))
}

/// Authenticate a gateway notification and apply it to the matching entry.
///
/// Replays re-apply the same field values, so a duplicate delivery leaves the
/// entry as the first one did.
pub async fn apply_status_update(state: &AppState, params: &WebhookParams) -> Result<WebhookOutcome, UpayError> {
    let raw_number = params.get("paymentRequestNumber").ok_or(UpayError::MissingParameter("paymentRequestNumber"))?;
    let secret = params.get("merchantUpdateSecret").ok_or(UpayError::MissingParameter("merchantUpdateSecret"))?;

    let payment_request_number = sanitize_title(raw_number);
    let entry = state
        .entries
        .find_by_request_number(&payment_request_number)
        .await?
        .ok_or_else(|| {
            debug!(%payment_request_number, "no entry for payment request number");
            UpayError::EntryNotFound
        })?;
    let form = state
        .forms
        .get_form(entry.form_id)
        .await?
        .filter(|f| f.is_payment_form())
        .ok_or_else(|| {
            debug!(form_id = entry.form_id, "entry does not belong to a payment form");
            UpayError::NotPaymentForm
        })?;

    let (creds, environment) = credentials::resolve(&state.settings, &form);
    if creds.merchant_update_secret.is_empty() || !creds.merchant_update_secret.matches(secret) {
        warn!(%payment_request_number, environment = environment.as_str(), "merchant update secret mismatch");
        return Err(UpayError::SecretMismatch);
    }

    let status = params.get("paymentStatus").ok_or(UpayError::MissingParameter("paymentStatus"))?;
    match status {
        "success" => {
            state.entries.update_status(entry.id, PaymentStatus::Paid).await?;
            let date = params.get("paymentDate").and_then(|raw| {
                let parsed = parse_payment_date(raw);
                if parsed.is_none() {
                    warn!(raw, "unparseable paymentDate ignored");
                }
                parsed
            });
            let amount = params.get("paymentAmount").and_then(|raw| {
                let parsed = parse_payment_amount(raw);
                if parsed.is_none() {
                    warn!(raw, "unparseable paymentAmount ignored");
                }
                parsed
            });
            if date.is_some() || amount.is_some() {
                state.entries.update_payment(entry.id, amount.as_ref(), date).await?;
            }
            let meta = gateway_metadata(params);
            if !meta.is_empty() {
                state.entries.merge_metadata(entry.id, &meta).await?;
            }
            info!(entry_id = entry.id, %payment_request_number, "payment marked paid");
            Ok(WebhookOutcome::Paid { payment_request_number })
        }
        "cancelled" => {
            state.entries.update_status(entry.id, PaymentStatus::Cancelled).await?;
            info!(entry_id = entry.id, %payment_request_number, "payment cancelled");
            Ok(WebhookOutcome::Cancelled { payment_request_number })
        }
        other => {
            warn!(status = other, %payment_request_number, "unexpected payment status");
            state
                .log_payment_event(
                    "status_update_listener",
                    "Unexpected payment status value.",
                    LogSeverity::Warning,
                    json!({ "entry_id": entry.id, "data": params.as_json() }),
                )
                .await;
            Err(UpayError::UnexpectedStatus)
        }
    }
}

fn gateway_metadata(params: &WebhookParams) -> BTreeMap<String, String> {
    META_FIELDS
        .iter()
        .filter_map(|(param, key)| params.get(param).map(|v| (key.to_string(), v.to_string())))
        .collect()
}

/// Lenient date parsing; the time of day and any offset are discarded.
pub fn parse_payment_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok().map(|dt| dt.date()))
        .or_else(|| DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(raw, f).ok()))
}

/// Amount as stored after a notification: separators stripped, two decimals.
pub fn parse_payment_amount(raw: &str) -> Option<BigDecimal> {
    parse_lenient(raw).ok().map(|v| normalize_scale(&v))
}
