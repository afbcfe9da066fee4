//! Checkout Webhook Server - Stripe webhook receiver.
//!
//! This binary serves the Stripe webhook endpoint that:
//! - Verifies the `Stripe-Signature` header over the raw body
//! - Marks the Firestore transaction completed on `checkout.session.completed`
//! - Acknowledges every other verified event untouched

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkout_webhook::{
    router, AppState, Config, FirestoreStore, MemoryStore, StoreBackend, TransactionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        webhook_secret_configured = config.has_webhook_secret(),
        signature_tolerance_secs = config.stripe_signature_tolerance_secs,
        store_backend = ?config.store_backend,
        firestore_project_id = ?config.firestore_project_id,
        firestore_database_id = %config.firestore_database_id,
        transactions_collection = %config.transactions_collection,
        firestore_emulator = config.firestore_emulator_host.is_some(),
        "config_loaded"
    );

    // Keep serving so Stripe sees 500 and keeps retrying until this is fixed
    if !config.has_webhook_secret() {
        error!("stripe_webhook_secret_missing");
    }

    let store: Arc<dyn TransactionStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(
            FirestoreStore::from_config(&config)
                .await
                .context("Failed to create Firestore store")?,
        ),
        StoreBackend::Memory => {
            warn!("memory_store_in_use");
            Arc::new(MemoryStore::new())
        }
    };
    info!("transaction_store_created");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, store));

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
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
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
