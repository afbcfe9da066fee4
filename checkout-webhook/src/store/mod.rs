//! Transaction store module.
//!
//! Transaction documents are created by the checkout flow elsewhere; this
//! service only ever completes an existing one. Two backends implement
//! [`TransactionStore`]:
//!
//! - [`FirestoreStore`]: Cloud Firestore over its REST API
//! - [`MemoryStore`]: a process-local map for local development and tests

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, TransactionRecord};

/// Lifecycle status of a transaction document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
        }
    }
}

/// Errors from a transaction store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist. Updates never create documents.
    #[error("Transaction {0} not found")]
    NotFound(String),

    /// The id cannot name a Firestore document.
    #[error("Invalid transaction id: {0:?}")]
    InvalidId(String),

    /// Network or transport failure talking to the backend
    #[error("Transaction store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Could not obtain credentials for the backend
    #[error("Transaction store authentication failed: {0}")]
    Auth(String),

    /// The backend refused the write as malformed (`INVALID_ARGUMENT`)
    #[error("Transaction store rejected the update: {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered with an error status
    #[error("Transaction store returned {status}: {message}")]
    Backend { status: u16, message: String },
}

impl StoreError {
    /// Whether redelivering the same event could succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Request(_) | StoreError::Auth(_) | StoreError::Backend { .. }
        )
    }
}

/// Storage seam for transaction documents.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Mark an existing transaction completed by a Stripe Checkout Session.
    ///
    /// Sets `status` to `completed`, `stripeSessionId` to `stripe_session_id`
    /// and `updatedAt` to the store's own clock. Fails with
    /// [`StoreError::NotFound`] instead of creating a missing document.
    /// Applying the same completion twice leaves the same status and session id.
    async fn complete_checkout(
        &self,
        transaction_id: &str,
        stripe_session_id: &str,
    ) -> Result<(), StoreError>;
}

/// Firestore's limit on a document id.
const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Reject ids that cannot name a single document in a collection.
///
/// Follows Firestore's document id rules: no `/`, not `.` or `..`, not
/// `__reserved__`, at most 1500 bytes.
pub(crate) fn validate_transaction_id(transaction_id: &str) -> Result<(), StoreError> {
    let reserved = transaction_id.len() >= 4
        && transaction_id.starts_with("__")
        && transaction_id.ends_with("__");

    if transaction_id.is_empty()
        || transaction_id.contains('/')
        || transaction_id == "."
        || transaction_id == ".."
        || reserved
        || transaction_id.len() > MAX_DOCUMENT_ID_BYTES
    {
        return Err(StoreError::InvalidId(transaction_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_status_strings() {
        assert_eq!(TransactionStatus::Completed.as_str(), "completed");
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn test_validate_transaction_id() {
        assert!(validate_transaction_id("tx_1").is_ok());
        assert!(matches!(
            validate_transaction_id(""),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            validate_transaction_id("tx/../other"),
            Err(StoreError::InvalidId(_))
        ));

        let too_long = "x".repeat(MAX_DOCUMENT_ID_BYTES + 1);
        for id in [".", "..", "__tx__", "____", too_long.as_str()] {
            assert!(
                matches!(validate_transaction_id(id), Err(StoreError::InvalidId(_))),
                "{:?} should be rejected",
                id
            );
        }

        assert!(validate_transaction_id("__tx").is_ok());
        assert!(validate_transaction_id("tx.1").is_ok());
        assert!(validate_transaction_id(&"x".repeat(MAX_DOCUMENT_ID_BYTES)).is_ok());
    }

    #[test]
    fn test_is_transient() {
        assert!(!StoreError::NotFound("tx_1".into()).is_transient());
        assert!(!StoreError::InvalidId("a/b".into()).is_transient());
        assert!(!StoreError::Rejected {
            status: 400,
            message: "invalid".into()
        }
        .is_transient());
        assert!(StoreError::Auth("metadata server unreachable".into()).is_transient());
        assert!(StoreError::Backend {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
    }
}
