//! Store Guard - demo host
//!
//! Runs a [`ResilientStore`] over the in-memory backend until interrupted.
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load settings from environment variables
//! 3. Build the store and subscribe a diagnostics forwarder
//! 4. Register a cleanup task and start the scheduler
//! 5. Exercise each container type, including a retried failure
//! 6. Stop the scheduler on SIGINT/SIGTERM

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use store_guard::{MemoryBackend, ResilientStore, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "store_guard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Store Guard demo");

    let settings = Settings::from_env();
    info!(
        "Settings loaded: retry_attempts={}, retry_base_delay={:?}, cleanup_interval={:?}",
        settings.retry_attempts, settings.retry_base_delay, settings.cleanup_interval
    );

    let backend = Arc::new(MemoryBackend::new());
    let store = ResilientStore::with_shared_backend(settings, Arc::clone(&backend))
        .context("invalid store settings")?;

    store.subscribe(|event| match serde_json::to_string(event) {
        Ok(json) => info!(target: "store_guard::events", "{}", json),
        Err(error) => warn!("Could not serialize diagnostic event: {}", error),
    });

    let reporter = Arc::clone(&backend);
    store.register_cleanup("call-report", move || {
        let backend = Arc::clone(&reporter);
        async move {
            info!("Backend has served {} calls", backend.call_count());
            Ok(())
        }
    })?;
    store.start_cleanup();

    store
        .containers()
        .set_value("profiles", "demo", &serde_json::json!({"name": "demo", "level": 1}), None)
        .await?;
    store.containers().set_score("leaderboard", "demo", 42.0, None).await?;
    store.containers().enqueue("jobs", "warm-up", None).await?;

    // First two calls fail, the executor absorbs them.
    backend.inject_failures(2);
    let profile: Option<serde_json::Value> = store.containers().get_value("profiles", "demo").await?;
    info!("Read back profile after transient failures: {:?}", profile);
    info!("Queue length: {}", store.containers().queue_length("jobs").await);

    shutdown_signal().await?;

    store.stop_cleanup();
    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        }
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
    Ok(())
}
