//! FloodWatch - Flood awareness platform API

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use floodwatch::{
    api::{self, AppState},
    config::Config,
    db,
    services::build_mailer,
};

/// Interval between sweeps of expired refresh tokens and codes
const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "floodwatch=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FloodWatch API...");

    // Load configuration
    let config_path = std::env::var("FLOODWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    config.validate()?;
    if config.uses_default_secret() {
        tracing::warn!("auth.jwt_secret is the development default; set FLOODWATCH_AUTH_JWT_SECRET");
    }
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let mailer = build_mailer(&config.email).context("Failed to initialize mailer")?;
    if !config.email.enabled {
        tracing::info!("Email delivery disabled, messages will only be logged");
    }

    let state = AppState::new(&pool, &config, mailer)?;

    // Purge expired refresh tokens and one-time codes
    {
        let tokens = state.token_service.clone();
        let otps = state.otp_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match tokens.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Purged {} expired refresh tokens", n),
                    Err(e) => tracing::warn!("Refresh token cleanup failed: {:#}", e),
                }
                match otps.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Purged {} expired codes", n),
                    Err(e) => tracing::warn!("Code cleanup failed: {:#}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
