//! Stripe event payloads.
//!
//! The raw body is parsed once, after signature verification, into an
//! [`Event`] whose [`EventKind`] names the event types this service acts on.
//! Everything else is carried as [`EventKind::Unhandled`] with its type tag.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Event type emitted when a Checkout Session finishes successfully.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Metadata key the checkout flow stores the transaction document id under.
pub const TRANSACTION_ID_METADATA_KEY: &str = "transactionId";

/// Reasons a verified body cannot be turned into an [`Event`].
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {event_type} object: {source}")]
    InvalidObject {
        event_type: String,
        source: serde_json::Error,
    },

    #[error("Checkout session {session_id} has no metadata.transactionId")]
    MissingTransactionId { session_id: String },
}

/// A verified Stripe event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event id (`evt_...`)
    pub id: String,
    /// Unix seconds the event was created at
    pub created: i64,
    /// Whether the event came from live mode
    pub livemode: bool,
    pub kind: EventKind,
}

/// The event types this service understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutSessionCompleted(CheckoutSession),
    /// Any other type. Acknowledged without action.
    Unhandled { event_type: String },
}

/// The parts of a Checkout Session this service consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session id (`cs_...`)
    pub id: String,
    /// `metadata.transactionId`, the transaction document to complete
    pub transaction_id: String,
    pub payment_status: Option<String>,
    /// Total in the smallest currency unit
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

impl TryFrom<RawCheckoutSession> for CheckoutSession {
    type Error = EventError;

    fn try_from(raw: RawCheckoutSession) -> Result<Self, Self::Error> {
        let transaction_id = raw
            .metadata
            .and_then(|mut m| m.remove(TRANSACTION_ID_METADATA_KEY))
            .filter(|id| !id.is_empty());

        match transaction_id {
            Some(transaction_id) => Ok(CheckoutSession {
                id: raw.id,
                transaction_id,
                payment_status: raw.payment_status,
                amount_total: raw.amount_total,
                currency: raw.currency,
            }),
            None => Err(EventError::MissingTransactionId { session_id: raw.id }),
        }
    }
}

impl Event {
    /// Parse a raw (already verified) webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, EventError> {
        let raw: RawEvent = serde_json::from_slice(body)?;

        let kind = match raw.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session: RawCheckoutSession = serde_json::from_value(raw.data.object)
                    .map_err(|source| EventError::InvalidObject {
                        event_type: raw.event_type.clone(),
                        source,
                    })?;
                EventKind::CheckoutSessionCompleted(session.try_into()?)
            }
            _ => EventKind::Unhandled {
                event_type: raw.event_type,
            },
        };

        Ok(Event {
            id: raw.id,
            created: raw.created,
            livemode: raw.livemode,
            kind,
        })
    }

    /// The Stripe type tag of this event.
    pub fn event_type(&self) -> &str {
        match &self.kind {
            EventKind::CheckoutSessionCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            EventKind::Unhandled { event_type } => event_type,
        }
    }
}
