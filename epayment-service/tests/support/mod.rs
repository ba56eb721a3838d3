#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use common_audit::{MemoryLogSink, PaymentLogger};
use common_crypto::ActionNonce;
use common_observability::UpayMetrics;
use epayment_service::{
    build_router,
    config::ServiceConfig,
    gateway::{PaymentGateway, StubGateway},
    repo::{Entry, InMemoryStore},
    settings::{Form, MerchantCredentials, PluginSettings},
    AppState, SERVICE_NAME,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const PROXY_KEY: &str = "0123456789abcdef0123456789abcd";
pub const UPDATE_SECRET: &str = "hook-secret";
pub const SITE_URL: &str = "https://forms.example.ubc.ca";

pub fn plugin_settings() -> PluginSettings {
    PluginSettings {
        onboarding_complete: true,
        test: MerchantCredentials {
            merchant_id: "AB12".into(),
            merchant_store_id: "07".into(),
            proxy_key: PROXY_KEY.into(),
            merchant_update_secret: UPDATE_SECRET.into(),
        },
        ..Default::default()
    }
}

pub fn payment_form(id: i64, confirmation: Value) -> Form {
    serde_json::from_value(json!({
        "id": id,
        "title": "Conference Fees",
        "settings": { "is_epayment_form": true, "environment": "test" },
        "confirmations": [confirmation],
    }))
    .unwrap()
}

pub fn plain_form(id: i64) -> Form {
    serde_json::from_value(json!({ "id": id, "title": "Newsletter" })).unwrap()
}

pub fn entry(id: i64, form_id: i64, extra: Value) -> Entry {
    let mut base = json!({
        "id": id,
        "form_id": form_id,
        "source_url": "https://forms.example.ubc.ca/register?lang=en",
        "fields": { "Name": "Ada Lovelace" },
    });
    if let (Some(obj), Value::Object(more)) = (base.as_object_mut(), extra) {
        obj.extend(more);
    }
    serde_json::from_value(base).unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<StubGateway>,
    pub log: Arc<MemoryLogSink>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(plugin_settings())
    }

    pub fn with_settings(settings: PluginSettings) -> Self {
        let gateway = Arc::new(StubGateway::new("<html>uPay checkout</html>"));
        Self::build(settings, gateway.clone(), gateway)
    }

    pub fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::build(plugin_settings(), Arc::new(StubGateway::new("")), gateway)
    }

    fn build(settings: PluginSettings, stub: Arc<StubGateway>, gateway: Arc<dyn PaymentGateway>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(MemoryLogSink::new());
        let mut config = ServiceConfig::with_nonce_secret("test-nonce-secret");
        config.site_url = SITE_URL.to_string();
        config.payment_log_path = None;
        let state = AppState {
            config: Arc::new(config),
            settings: Arc::new(settings),
            entries: store.clone(),
            forms: store.clone(),
            gateway,
            payment_log: PaymentLogger::new(log.clone(), SERVICE_NAME),
            nonce: ActionNonce::new("test-nonce-secret", 86_400).unwrap(),
            metrics: UpayMetrics::new().unwrap(),
        };
        Self { store, gateway: stub, log, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }
}

pub async fn body_string(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}
