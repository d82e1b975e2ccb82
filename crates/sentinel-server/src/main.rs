//! Sentinel server binary — the main entry point.
//!
//! Starts the axum HTTP/WebSocket server with structured logging, database
//! initialization, the fan-out worker, and graceful shutdown on
//! SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sentinel_push::{AlertDispatcher, SubscriptionStore, VapidKeyProvider, WebPushClient};
use sentinel_server::api_camera::NoopDetector;
use sentinel_server::api_ws::ViewerRegistry;
use sentinel_server::{app, config, fanout, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SENTINEL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = sentinel_db::create_pool(
        &config.database.path,
        sentinel_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            sentinel_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Assemble the owned registries and the push subsystem.
    let subscriptions = Arc::new(SubscriptionStore::new());
    let vapid_keys = Arc::new(VapidKeyProvider::new(&config.push.key_dir));
    let push_client = WebPushClient::new(
        config.push.contact.clone(),
        Duration::from_millis(config.push.timeout_ms),
        config.push.ttl_secs,
    )
    .expect("failed to build push delivery client");
    let dispatcher = Arc::new(AlertDispatcher::new(
        subscriptions.clone(),
        vapid_keys.clone(),
        push_client,
    ));

    let (fanout_tx, fanout_rx) = fanout::fanout_channel();

    let state = AppState {
        pool,
        viewers: ViewerRegistry::new(),
        subscriptions,
        vapid_keys,
        dispatcher,
        detector: Arc::new(NoopDetector),
        fanout_tx,
    };

    // The fan-out worker outlives every request; it drains broadcast and
    // push work that ingestion enqueues.
    tokio::spawn(fanout::run_worker(state.clone(), fanout_rx));

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting sentinel server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("sentinel server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
