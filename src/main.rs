//! Agora server binary

use agora::{
    AppState,
    config::{AppConfig, LoggingConfig},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// `RUST_LOG` overrides `logging.level` when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directives()));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config comes first so its logging section drives the subscriber
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    agora::metrics::init_metrics();

    tracing::info!(
        domain = %config.server.domain,
        database = %config.database.path.display(),
        admins = config.auth.admin_user_ids.len(),
        relay_max_message_bytes = config.relay.max_message_bytes,
        "Starting Agora"
    );

    if !config.should_use_secure_cookies() {
        tracing::warn!(protocol = %config.server.protocol, "Serving a local domain without https");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let public_url = config.server.base_url();

    let state = AppState::new(config).await?;
    let app = agora::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, %public_url, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
