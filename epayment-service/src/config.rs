use anyhow::{bail, Context, Result};
use common_crypto::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::settings::{flag, Environment};

/// Where payment requests are posted.
#[derive(Debug, Clone)]
pub struct GatewayEndpoint {
    pub protocol: String,
    /// `None` leaves the port out of the URL.
    pub port: Option<u16>,
    pub base_path: String,
    pub host_test: String,
    pub host_prod: String,
    /// Local development: post to `{site_url}{base_path}` instead of the real gateway.
    pub dev_mode: bool,
}

impl Default for GatewayEndpoint {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            port: Some(443),
            base_path: "/upay/v1".to_string(),
            host_test: "sat.api.ubc.ca".to_string(),
            host_prod: "api.ubc.ca".to_string(),
            dev_mode: false,
        }
    }
}

impl GatewayEndpoint {
    pub fn payment_request_url(&self, environment: Environment, site_url: &str) -> String {
        let base = format!("/{}", self.base_path.trim_matches('/'));
        if self.dev_mode {
            return format!("{}{base}/payment-request", site_url.trim_end_matches('/'));
        }
        let host = match environment {
            Environment::Test => &self.host_test,
            Environment::Prod => &self.host_prod,
        };
        match self.port {
            Some(port) => format!("{}://{host}:{port}{base}/payment-request", self.protocol),
            None => format!("{}://{host}{base}/payment-request", self.protocol),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub site_url: String,
    pub gateway: GatewayEndpoint,
    pub request_prefix: String,
    pub site_id: Option<u32>,
    pub http_timeout: Duration,
    pub nonce_secret: SecretString,
    pub nonce_lifetime_secs: u64,
    pub payment_log_path: Option<PathBuf>,
    pub debug: bool,
    pub database_url: Option<String>,
    pub forms_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Defaults for everything except the nonce secret, which has none.
    pub fn with_nonce_secret(nonce_secret: &str) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
            site_url: "http://localhost:8086".to_string(),
            gateway: GatewayEndpoint::default(),
            request_prefix: "ubc".to_string(),
            site_id: None,
            http_timeout: Duration::from_secs(30),
            nonce_secret: SecretString::new(nonce_secret),
            nonce_lifetime_secs: 86_400,
            payment_log_path: Some(PathBuf::from("payment-log.jsonl")),
            debug: false,
            database_url: None,
            forms_file: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let nonce_secret = env::var("UPAY_NONCE_SECRET").context("UPAY_NONCE_SECRET must be set")?;
        if nonce_secret.trim().is_empty() {
            bail!("UPAY_NONCE_SECRET must not be empty");
        }
        let mut config = Self::with_nonce_secret(nonce_secret.trim());

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        config.port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(config.port);
        config.site_url = env::var("UPAY_SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", config.port));

        let gateway = &mut config.gateway;
        if let Ok(protocol) = env::var("UPAY_PROTOCOL") {
            gateway.protocol = protocol;
        }
        if let Ok(port) = env::var("UPAY_PORT") {
            gateway.port = if port.trim().is_empty() {
                None
            } else {
                Some(port.trim().parse::<u16>().with_context(|| format!("UPAY_PORT `{port}` is not a port"))?)
            };
        }
        if let Ok(base) = env::var("UPAY_BASE_URL") {
            gateway.base_path = base;
        }
        if let Ok(host) = env::var("UPAY_HOST_NAME_TEST") {
            gateway.host_test = host;
        }
        if let Ok(host) = env::var("UPAY_HOST_NAME_PROD") {
            gateway.host_prod = host;
        }
        gateway.dev_mode = flag("UPAY_DEV");

        if let Ok(prefix) = env::var("UPAY_REQUEST_PREFIX") {
            config.request_prefix = prefix;
        }
        config.site_id = env::var("UPAY_SITE_ID").ok().and_then(|value| value.parse::<u32>().ok());
        config.http_timeout = Duration::from_secs(
            env::var("UPAY_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(30)
                .max(1),
        );
        config.nonce_lifetime_secs = env::var("UPAY_NONCE_LIFETIME_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(86_400)
            .max(2);
        config.payment_log_path = match env::var("UPAY_PAYMENT_LOG_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => config.payment_log_path,
        };
        config.debug = flag("UPAY_DEBUG");
        config.database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        config.forms_file = env::var("UPAY_FORMS_FILE").ok().map(PathBuf::from);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_per_environment() {
        let endpoint = GatewayEndpoint::default();
        assert_eq!(
            endpoint.payment_request_url(Environment::Test, "http://site"),
            "https://sat.api.ubc.ca:443/upay/v1/payment-request"
        );
        assert_eq!(
            endpoint.payment_request_url(Environment::Prod, "http://site"),
            "https://api.ubc.ca:443/upay/v1/payment-request"
        );
    }

    #[test]
    fn port_can_be_omitted() {
        let endpoint = GatewayEndpoint { port: None, protocol: "http".into(), ..Default::default() };
        assert_eq!(
            endpoint.payment_request_url(Environment::Prod, ""),
            "http://api.ubc.ca/upay/v1/payment-request"
        );
    }

    #[test]
    fn dev_mode_posts_to_site() {
        let endpoint = GatewayEndpoint { dev_mode: true, ..Default::default() };
        assert_eq!(
            endpoint.payment_request_url(Environment::Prod, "http://localhost:8080/"),
            "http://localhost:8080/upay/v1/payment-request"
        );
    }
}
