//! Web server module for handling inbound Stripe webhooks.
//!
//! Routes:
//! - `POST /webhooks/stripe`: Stripe event ingest
//! - `POST /stripeWebhook`: same handler under the Cloud Functions name,
//!   so existing Stripe endpoint configuration keeps working
//! - `GET /health`

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, stripe_webhook, AppState, HealthResponse, WebhookAck};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/stripeWebhook", post(stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
