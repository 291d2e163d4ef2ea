//! RateLend ledger server
//!
//! Serves the lending ledger over HTTP and WebSocket, replaying the
//! write-ahead log on start and running the overdue-loan monitor.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use ratelend_server::auth::AuthConfig;
use ratelend_server::config::Config;
use ratelend_server::ledger::{Clock, Ledger, SystemClock};
use ratelend_server::middleware::RateLimiter;
use ratelend_server::monitor::overdue_detector;
use ratelend_server::oracle::{HttpRateOracle, RateOracle, RateQuoter, StaticRateOracle};
use ratelend_server::routes::app_router;
use ratelend_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting RateLend server");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let oracle: Arc<dyn RateOracle> = match &config.oracle_url {
        Some(url) => {
            tracing::info!(%url, "Using HTTP rate oracle");
            Arc::new(HttpRateOracle::new(url.clone()).context("Failed to build oracle client")?)
        }
        None => {
            tracing::info!(rate_bps = config.oracle_static_rate_bps, "Using static rate oracle");
            Arc::new(StaticRateOracle::new(config.oracle_static_rate_bps, clock.clone()))
        }
    };
    let quoter = RateQuoter::new(
        oracle,
        config.fixed_rate_spread_bps,
        config.oracle_max_staleness_secs,
    );

    let ledger = match &config.ledger_wal_path {
        Some(path) => Ledger::open(path, clock.clone(), config.rate_model, quoter)
            .await
            .with_context(|| format!("Failed to replay ledger from {}", path.display()))?,
        None => {
            tracing::warn!("LEDGER_WAL_PATH not set, ledger state is in-memory only");
            Ledger::new(clock.clone(), config.rate_model, quoter)
        }
    };
    let ledger = Arc::new(ledger);

    let monitor_ledger = ledger.clone();
    let scan_interval = Duration::from_secs(config.overdue_scan_interval_secs.max(1));
    tokio::spawn(async move {
        overdue_detector(monitor_ledger, scan_interval).await;
        tracing::error!("Overdue detector task exited unexpectedly");
    });

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    let prune_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            prune_limiter.prune(Duration::from_secs(600)).await;
        }
    });

    let auth = AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        access_token_ttl_seconds: config.jwt_access_token_ttl_seconds,
        dev_tokens_enabled: !config.environment.is_production(),
    };
    let app_state = AppState::new(ledger, auth);

    // request logging comes from the router's own tracing middleware
    let app = app_router(app_state, rate_limiter).layer(
        ServiceBuilder::new().layer(configure_cors(config.cors_allowed_origins.as_deref())),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
