//! Webhook endpoint handlers.
//!
//! The Stripe handler runs a straight line:
//! 1. Check a signing secret is configured
//! 2. Verify the signature over the raw body
//! 3. Parse the event
//! 4. Complete the transaction for `checkout.session.completed`
//! 5. Acknowledge with `{"received": true}`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::WebhookError;
use crate::store::TransactionStore;
use crate::stripe::{signature, Event, EventKind, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn TransactionStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn TransactionStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stripe Webhook
// =============================================================================

/// Acknowledgement Stripe expects on success.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Stripe webhook endpoint.
///
/// Takes the body as raw bytes: the signature covers the exact bytes Stripe
/// sent, so nothing may parse or re-encode them before verification.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        error!("stripe_webhook_secret_missing");
        return Err(WebhookError::MissingSecret);
    };

    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    info!(
        body_length = body.len(),
        has_signature = !signature_header.is_empty(),
        "stripe_webhook_received"
    );

    if let Err(e) = process_event(&state, secret, signature_header, &body).await {
        error!(
            error = %e,
            status = e.status_code().as_u16(),
            "stripe_webhook_error"
        );
        return Err(e);
    }

    Ok(Json(WebhookAck { received: true }))
}

async fn process_event(
    state: &AppState,
    secret: &str,
    signature_header: &str,
    body: &[u8],
) -> Result<(), WebhookError> {
    signature::verify(
        body,
        signature_header,
        secret,
        state.config.stripe_signature_tolerance_secs,
    )?;

    let event = Event::from_slice(body)?;

    match &event.kind {
        EventKind::CheckoutSessionCompleted(session) => {
            info!(
                event_id = %event.id,
                livemode = event.livemode,
                stripe_session_id = %session.id,
                transaction_id = %session.transaction_id,
                payment_status = ?session.payment_status,
                amount_total = ?session.amount_total,
                currency = ?session.currency,
                "checkout_session_completed"
            );

            if let Err(e) = state
                .store
                .complete_checkout(&session.transaction_id, &session.id)
                .await
            {
                warn!(
                    transaction_id = %session.transaction_id,
                    error = %e,
                    transient = e.is_transient(),
                    "transaction_update_failed"
                );
                return Err(e.into());
            }

            info!(
                stripe_session_id = %session.id,
                transaction_id = %session.transaction_id,
                "payment_completed"
            );
        }
        EventKind::Unhandled { event_type } => {
            debug!(
                event_id = %event.id,
                event_type = %event_type,
                "stripe_event_unhandled"
            );
        }
    }

    Ok(())
}
