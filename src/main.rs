use std::sync::Arc;

use porter_dispatch::api;
use porter_dispatch::config::{Config, LogFormat};
use porter_dispatch::error::AppError;
use porter_dispatch::external::bookings::InMemoryBookingStore;
use porter_dispatch::external::geocode::NominatimResolver;
use porter_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let geocoder = NominatimResolver::new(config.geocoder())
        .map_err(|err| AppError::Internal(format!("failed to build geocoder client: {err}")))?;

    let state = Arc::new(AppState::new(
        config.engine_settings(),
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(geocoder),
    ));

    if let Some(seed) = config.sim_seed {
        tracing::info!(seed, "simulation seeded for replay");
    }

    let app = api::rest::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        tick_ms = config.tracking_tick_ms,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
