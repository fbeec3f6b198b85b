use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use cookbook_api::config::ServerConfig;
use cookbook_api::engine::{SimulatedConfig, SimulatedExecutor};
use cookbook_api::router::build_app_router;
use cookbook_api::state::AppState;
use cookbook_api::ws;
use cookbook_events::EventBus;
use cookbook_pipeline::{BootstrapCoordinator, PipelineConfig, RefineCoordinator};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let fmt_layer = match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().boxed(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cookbook_api=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let simulated_config = SimulatedConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        max_concurrency = pipeline_config.max_concurrency,
        task_timeout_secs = pipeline_config.task_timeout.as_secs(),
        simulated_task_ms = simulated_config.task_delay.as_millis() as u64,
        "Loaded pipeline configuration",
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    tracing::info!("Event bus created");

    // --- Coordinators ---
    let executor = Arc::new(SimulatedExecutor::new(simulated_config));
    let bootstrap = BootstrapCoordinator::new(
        Arc::clone(&event_bus),
        executor.clone(),
        executor.clone(),
        pipeline_config.clone(),
    );
    let refine = RefineCoordinator::new(Arc::clone(&event_bus), executor, pipeline_config);

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        Duration::from_secs(config.heartbeat_interval_secs),
    );

    // --- Event forwarder (bus -> WebSocket clients) ---
    let forwarder_handle =
        ws::start_event_forwarder(event_bus.subscribe(), Arc::clone(&ws_manager));
    tracing::info!("Event forwarder started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        bootstrap: bootstrap.clone(),
        refine: refine.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let cleanup = async {
        // Cancel running sessions so their terminal events go out first.
        bootstrap.shutdown().await;
        refine.shutdown().await;
        tracing::info!("Running sessions cancelled");

        let closed = ws_manager.close_all().await;
        tracing::info!(closed, "Observers disconnected");
    };
    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), cleanup)
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Cleanup did not finish in time",
        );
    }

    forwarder_handle.abort();
    heartbeat_handle.abort();
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
