use bigdecimal::BigDecimal;
use common_audit::LogSeverity;
use common_money::NormalizedMoney;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info};

use crate::account_override;
use crate::config::ServiceConfig;
use crate::credentials;
use crate::error::{UpayError, ValidationError};
use crate::gateway::GatewayResponse;
use crate::settings::{Environment, Form, PluginSettings};
use crate::signer;
use crate::AppState;

static MERCHANT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{4,10}$").expect("static pattern"));
static MERCHANT_STORE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{2}$").expect("static pattern"));
static PROXY_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]{30}$").expect("static pattern"));

const MAX_REQUEST_NUMBER_LEN: usize = 250;

/// A signed, validated payment request. Built per submission and dropped once posted.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub url: String,
    pub environment: Environment,
    pub merchant_id: String,
    pub merchant_store_id: String,
    pub amount: NormalizedMoney,
    pub request_number: String,
    pub proxy_hash: String,
    pub account_overrides: Vec<(String, String)>,
}

impl PaymentRequest {
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("merchantId".to_string(), self.merchant_id.clone()),
            ("merchantStoreId".to_string(), self.merchant_store_id.clone()),
            ("paymentRequestAmount".to_string(), self.amount.to_string()),
            ("paymentRequestNumber".to_string(), self.request_number.clone()),
            ("proxyHash".to_string(), self.proxy_hash.clone()),
        ];
        fields.extend(self.account_overrides.iter().cloned());
        fields
    }
}

/// Check credentials, amount and request number in that order, then the
/// account overrides, then sign. The first failure is returned.
pub fn build(
    config: &ServiceConfig,
    settings: &PluginSettings,
    form: &Form,
    amount: &BigDecimal,
    request_number: &str,
) -> Result<PaymentRequest, ValidationError> {
    let (creds, environment) = credentials::resolve(settings, form);
    if !MERCHANT_ID.is_match(&creds.merchant_id) {
        return Err(ValidationError::MerchantId);
    }
    if !MERCHANT_STORE_ID.is_match(&creds.merchant_store_id) {
        return Err(ValidationError::MerchantStoreId);
    }
    if !PROXY_KEY.is_match(creds.proxy_key.expose()) {
        return Err(ValidationError::ProxyKey);
    }
    if *amount < min_amount() {
        return Err(ValidationError::AmountTooSmall);
    }
    if *amount > max_amount() {
        return Err(ValidationError::AmountTooLarge);
    }
    if request_number.is_empty() || request_number.len() > MAX_REQUEST_NUMBER_LEN {
        return Err(ValidationError::RequestNumberLength(request_number.len()));
    }

    let amount = NormalizedMoney::new(amount.clone());
    let groups = account_override::validate(&form.settings)?;
    let account_overrides = account_override::encode(&groups, &amount);
    let proxy_hash = signer::sign(creds.proxy_key.expose(), request_number, &amount);

    Ok(PaymentRequest {
        url: config.gateway.payment_request_url(environment, &config.site_url),
        environment,
        merchant_id: creds.merchant_id.clone(),
        merchant_store_id: creds.merchant_store_id.clone(),
        amount,
        request_number: request_number.to_string(),
        proxy_hash,
        account_overrides,
    })
}

/// Build, sign and post. Validation failures are written to the payment log and
/// returned; nothing is sent in that case.
pub async fn build_and_send(
    state: &AppState,
    form: &Form,
    amount: &BigDecimal,
    request_number: &str,
) -> Result<GatewayResponse, UpayError> {
    let request = match build(&state.config, &state.settings, form, amount, request_number) {
        Ok(request) => request,
        Err(err) => {
            debug!(form_id = form.id, request_number, error = %err, "payment request rejected");
            state.metrics.payment_requests_total.with_label_values(&["invalid"]).inc();
            state
                .log_payment_event(
                    "payment_request",
                    &err.to_string(),
                    LogSeverity::Error,
                    json!({
                        "form_id": form.id,
                        "payment_request_number": request_number,
                        "payment_amount": amount.to_string(),
                    }),
                )
                .await;
            return Err(err.into());
        }
    };

    info!(
        form_id = form.id,
        request_number = %request.request_number,
        amount = %request.amount,
        environment = request.environment.as_str(),
        "posting payment request"
    );
    let timer = state.metrics.gateway_latency_seconds.start_timer();
    let result = state.gateway.post_payment_request(&request.url, &request.form_fields()).await;
    timer.observe_duration();
    match result {
        Ok(response) => {
            state.metrics.payment_requests_total.with_label_values(&["sent"]).inc();
            debug!(status = response.status, "payment gateway responded");
            Ok(response)
        }
        Err(err) => {
            state.metrics.payment_requests_total.with_label_values(&["transport_error"]).inc();
            debug!(error = %err, "payment gateway unreachable");
            Err(err.into())
        }
    }
}

fn min_amount() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

fn max_amount() -> BigDecimal {
    BigDecimal::from(9_999_999) / BigDecimal::from(100)
}
