//! Conference Controller
//!
//! Entry point for the Conclave conference and call orchestration core.
//! Owns conference/participant/call lifecycles, publishes domain events,
//! and reconciles the store against the media bridge.

use conference_controller::config::Config;
use conference_controller::observability::metrics::init_metrics_recorder;
use conference_controller::routes::{self, AppState};
use conference_controller::services::{
    HttpChatClient, HttpMediaBridge, InviteFanout, RedisEventPublisher,
};
use conference_controller::tasks::{start_stale_reaper, StaleReaperConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conference_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Conference Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        event_channel = %config.event_channel,
        bridge_base_url = %config.bridge_base_url,
        "Configuration loaded successfully"
    );

    // Install the Prometheus recorder before anything records samples
    let metrics_handle = match init_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    };

    // Initialize database connection pool with query timeout
    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    // External collaborators
    let bridge = Arc::new(HttpMediaBridge::new(&config.bridge_base_url).map_err(|e| {
        error!("Failed to build bridge client: {}", e);
        e
    })?);
    let events = Arc::new(
        RedisEventPublisher::connect(&config.redis_url, &config.event_channel)
            .await
            .map_err(|e| {
                error!("Failed to connect to event bus: {}", e);
                e
            })?,
    );
    let chat = Arc::new(HttpChatClient::new(&config.chat_base_url).map_err(|e| {
        error!("Failed to build chat client: {}", e);
        e
    })?);

    // One cancellation scope for every background task
    let cancel_token = CancellationToken::new();

    let invites = Arc::new(InviteFanout::new(
        pool.clone(),
        bridge.clone(),
        cancel_token.clone(),
    ));

    // Start the stale-state reaper
    let reaper = tokio::spawn(start_stale_reaper(
        pool.clone(),
        StaleReaperConfig::from_env(),
        cancel_token.clone(),
    ));

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();

    // Create application state
    let state = Arc::new(AppState {
        pool,
        config,
        bridge,
        events,
        chat,
        invites,
        metrics_handle,
    });

    // Build application routes
    let app = routes::build_routes(state);

    // Parse bind address
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Conference Controller listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop background tasks and in-flight invites
    cancel_token.cancel();
    if let Err(e) = reaper.await {
        warn!("Reaper task join failed: {}", e);
    }

    info!("Conference Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period
    let drain_secs: u64 = std::env::var("CONF_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (CONF_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL.
/// This ensures queries don't hang indefinitely.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
