use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use cookbook_observer::{LogNotifier, ObserverConfig, Watcher};

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
                .unwrap_or_else(|_| "cookbook_observer=info".into()),
        )
        .with(fmt_layer)
        .init();

    // --- Configuration ---
    let config = ObserverConfig::from_env();
    tracing::info!(backend_url = %config.backend_url, "Loaded observer configuration");

    // --- Watcher ---
    let cancel = CancellationToken::new();
    let watcher = Watcher::new(&config, Arc::new(LogNotifier));
    let handle = tokio::spawn(watcher.run(cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl-C handler");
    tracing::info!("Received SIGINT (Ctrl-C), stopping");

    cancel.cancel();
    let _ = handle.await;
    tracing::info!("Observer stopped");
}
