use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Transport(String),
}

/// What came back from the gateway. The body is handed to the shopper as-is,
/// whatever the status.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn post_payment_request(&self, url: &str, fields: &[(String, String)]) -> Result<GatewayResponse, GatewayError>;
}

/// Form-encoded POST over reqwest. No retries.
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn post_payment_request(&self, url: &str, fields: &[(String, String)]) -> Result<GatewayResponse, GatewayError> {
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        if status >= 400 {
            tracing::warn!(status, url, "payment gateway answered with an error status");
        }
        Ok(GatewayResponse { status, body })
    }
}

/// Answers every request with a fixed body and remembers what was posted.
pub struct StubGateway {
    body: String,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StubGateway {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into(), calls: Mutex::new(Vec::new()) }
    }

    pub async fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn post_payment_request(&self, url: &str, fields: &[(String, String)]) -> Result<GatewayResponse, GatewayError> {
        self.calls.lock().await.push((url.to_string(), fields.to_vec()));
        Ok(GatewayResponse { status: 200, body: self.body.clone() })
    }
}
