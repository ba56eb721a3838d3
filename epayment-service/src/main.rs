use anyhow::Context;
use common_audit::{JsonLinesFileSink, PaymentLogger};
use common_crypto::ActionNonce;
use common_observability::UpayMetrics;
use epayment_service::{
    build_router,
    config::ServiceConfig,
    gateway::HttpGateway,
    repo::{EntryStore, FormStore, InMemoryStore, PgStore},
    settings::PluginSettings,
    AppState, SERVICE_NAME,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let settings = PluginSettings::from_env();
    if settings.legacy_plugin_active {
        warn!("legacy payment plugin detected; all forms use test credentials");
    }

    let (entries, forms) = build_stores(&config).await?;

    let payment_log = match &config.payment_log_path {
        Some(path) => {
            info!(path = %path.display(), "payment log enabled");
            PaymentLogger::new(Arc::new(JsonLinesFileSink::new(path.clone())), SERVICE_NAME)
        }
        None => PaymentLogger::noop(SERVICE_NAME),
    };
    let gateway = HttpGateway::new(config.http_timeout).context("building payment gateway client")?;
    let nonce = ActionNonce::new(config.nonce_secret.expose(), config.nonce_lifetime_secs)
        .context("building confirmation nonce")?;
    let metrics = UpayMetrics::new().context("registering metrics")?;

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let state = AppState {
        config: Arc::new(config),
        settings: Arc::new(settings),
        entries,
        forms,
        gateway: Arc::new(gateway),
        payment_log,
        nonce,
        metrics,
    };
    let app = build_router(state);

    info!(%addr, "starting {SERVICE_NAME}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_stores(config: &ServiceConfig) -> anyhow::Result<(Arc<dyn EntryStore>, Arc<dyn FormStore>)> {
    if let Some(url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .context("connecting to DATABASE_URL")?;
        let store = Arc::new(PgStore::new(pool));
        store.migrate().await.context("running migrations")?;
        info!("using postgres store");
        let entries: Arc<dyn EntryStore> = store.clone();
        let forms: Arc<dyn FormStore> = store;
        return Ok((entries, forms));
    }
    let store = match &config.forms_file {
        Some(path) => InMemoryStore::from_json_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            warn!("no DATABASE_URL or UPAY_FORMS_FILE; starting with an empty in-memory store");
            InMemoryStore::new()
        }
    };
    let store = Arc::new(store);
    let entries: Arc<dyn EntryStore> = store.clone();
    let forms: Arc<dyn FormStore> = store;
    Ok((entries, forms))
}
