use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use common_audit::{LogSeverity, PaymentLogger};
use common_crypto::ActionNonce;
use common_observability::UpayMetrics;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod account_override;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod merge_tags;
pub mod payment_request;
pub mod redirects;
pub mod repo;
pub mod settings;
pub mod signer;
pub mod slug;
pub mod submission;
pub mod webhook;

use config::ServiceConfig;
use gateway::PaymentGateway;
use repo::{EntryStore, FormStore};
use settings::PluginSettings;

pub const SERVICE_NAME: &str = "epayment-service";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub settings: Arc<PluginSettings>,
    pub entries: Arc<dyn EntryStore>,
    pub forms: Arc<dyn FormStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub payment_log: PaymentLogger,
    pub nonce: ActionNonce,
    pub metrics: UpayMetrics,
}

impl AppState {
    /// Write to the durable payment log. A failed write is counted and warned
    /// about but never fails the request.
    pub async fn log_payment_event(&self, category: &str, message: &str, severity: LogSeverity, context: serde_json::Value) {
        if let Err(err) = self.payment_log.record(category, message, severity, context).await {
            self.metrics.payment_log_failures.inc();
            warn!(error = %err, category, "payment log write failed");
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}")),
    }
}

async fn http_error_metrics(State(metrics): State<UpayMetrics>, req: Request<Body>, next: Next) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics
            .http_errors_total
            .with_label_values(&[SERVICE_NAME, code, status.as_str()])
            .inc();
    }
    resp
}

/// The full HTTP surface. Payment routes are only mounted once onboarding is
/// complete; health and metrics are always served.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint));

    if state.settings.onboarding_complete {
        router = router
            .route("/wp-json/ubc/v1/epayments-upay", post(webhook::status_update))
            .route("/ubc-epayment/confirmation", get(redirects::confirmation_content))
            .route("/ubc-epayment/:outcome", get(redirects::gateway_return))
            .route("/ubc-upay/submissions", post(submission::create_submission))
            .route("/ubc-upay-template", get(submission::payment_template));
    } else {
        warn!("onboarding is not complete; payment routes are disabled");
    }

    let metrics = state.metrics.clone();
    router
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics, http_error_metrics))
        .layer(TraceLayer::new_for_http())
}
