//! Checkout webhook - Stripe event receiver for checkout completion.
//!
//! Receives Stripe webhooks, verifies their signature, and marks the matching
//! Firestore transaction document completed when a Checkout Session finishes.
//!
//! ## Flow
//!
//! ```text
//! Stripe → POST /webhooks/stripe → verify signature → parse event
//!        → checkout.session.completed? → complete transaction → 200 {"received":true}
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod stripe;
pub mod web;

// Re-export commonly used types
pub use config::{Config, StoreBackend};
pub use error::WebhookError;
pub use store::{FirestoreStore, MemoryStore, StoreError, TransactionStore};
pub use web::{router, AppState};
