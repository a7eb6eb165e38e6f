use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livetext_hub::config::ServerConfig;
use livetext_hub::router::build_app_router;
use livetext_hub::state::AppState;
use livetext_hub::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livetext_hub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage (optional: absence means degraded, non-persistent mode) ---
    let pool = match std::env::var("DATABASE_URL") {
        Ok(url) => match livetext_db::create_pool(&url).await {
            Ok(pool) => {
                if let Err(e) = livetext_db::health_check(&pool).await {
                    tracing::warn!(error = %e, "Database health check failed; running degraded");
                    None
                } else {
                    livetext_db::run_migrations(&pool)
                        .await
                        .expect("Failed to run database migrations");
                    tracing::info!("Database connected and migrations applied");
                    Some(pool)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Database unreachable; running degraded");
                None
            }
        },
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; running without durable storage");
            None
        }
    };

    // --- State ---
    let state = AppState::new(pool, config.clone());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.registry));

    // --- Router ---
    let registry = Arc::clone(&state.registry);
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid host/port combination");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "livetext hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Drain ---
    heartbeat_handle.abort();
    registry.shutdown_all().await;
    tracing::info!("Shutdown complete");
}

/// Resolve when Ctrl-C (or SIGTERM on Unix) is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
