//! OrderRelay API server binary entrypoint.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use relay_common::config::AppConfig;
use relay_common::db::{create_pool, run_migrations};
use relay_engine::dispatch::DispatchService;
use relay_engine::postgres::{PgIntegrationRepository, PgOrderRepository, PgSendLogRepository};
use relay_engine::retry::RetryPolicy;
use relay_notifier::TelegramClient;

use relay_api::routes::create_router;
use relay_api::state::AppState;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "relay_api=info,relay_engine=info,relay_notifier=info,tower_http=info",
            )
        }))
        .json()
        .init();

    tracing::info!("Starting OrderRelay API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Database
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Notification pipeline
    let transport = TelegramClient::new(config.telegram_send_timeout())?
        .with_base_url(config.telegram_api_base_url.clone());
    let policy = RetryPolicy::new(
        config.telegram_max_attempts,
        config.telegram_retry_base_delay(),
    );
    tracing::info!(
        max_attempts = policy.max_attempts,
        base_delay_ms = policy.base_delay.as_millis() as u64,
        send_timeout_ms = config.telegram_send_timeout_ms,
        "Telegram delivery configured"
    );

    let service = DispatchService::new(
        Arc::new(PgIntegrationRepository::new(pool.clone())),
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(PgSendLogRepository::new(pool.clone())),
        Arc::new(transport),
        policy,
    );

    // Build router
    let app = create_router(AppState::new(service))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.frontend_url)?);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop_rx.await.ok();
            })
            .into_future(),
    );

    shutdown_signal().await;
    tracing::info!("Received shutdown signal, draining in-flight requests...");
    stop_tx.send(()).ok();

    // Background deliveries are not awaited; only HTTP requests get the grace period.
    match tokio::time::timeout(config.shutdown_grace(), server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            grace_secs = config.shutdown_grace_secs,
            "Shutdown grace period elapsed with requests still in flight"
        ),
    }

    pool.close().await;
    tracing::info!("OrderRelay API server stopped.");
    Ok(())
}

fn cors_layer(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = frontend_url
        .parse()
        .map_err(|_| anyhow::anyhow!("FRONTEND_URL is not a valid origin: {}", frontend_url))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
