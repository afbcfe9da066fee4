//! Stripe webhook primitives.
//!
//! - [`signature`]: `Stripe-Signature` header verification
//! - [`event`]: typed event payloads

pub mod event;
pub mod signature;

pub use event::{CheckoutSession, Event, EventError, EventKind, CHECKOUT_SESSION_COMPLETED};
pub use signature::{compute_signature, verify, SignatureError, SIGNATURE_HEADER};
