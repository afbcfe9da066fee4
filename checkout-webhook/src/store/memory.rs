//! In-memory transaction store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{validate_transaction_id, StoreError, TransactionStatus, TransactionStore};

/// A transaction document as held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub status: TransactionStatus,
    pub stripe_session_id: Option<String>,
    /// Assigned by the store on every update
    pub updated_at: Option<SystemTime>,
}

impl TransactionRecord {
    /// A freshly created transaction awaiting payment.
    pub fn pending() -> Self {
        Self {
            status: TransactionStatus::Pending,
            stripe_session_id: None,
            updated_at: None,
        }
    }
}

/// Process-local transaction store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, TransactionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, standing in for the checkout flow.
    pub async fn insert(&self, transaction_id: impl Into<String>, record: TransactionRecord) {
        self.records
            .write()
            .await
            .insert(transaction_id.into(), record);
    }

    pub async fn get(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.records.read().await.get(transaction_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn complete_checkout(
        &self,
        transaction_id: &str,
        stripe_session_id: &str,
    ) -> Result<(), StoreError> {
        validate_transaction_id(transaction_id)?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(transaction_id)
            .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))?;

        record.status = TransactionStatus::Completed;
        record.stripe_session_id = Some(stripe_session_id.to_string());
        record.updated_at = Some(SystemTime::now());

        debug!(
            transaction_id = transaction_id,
            stripe_session_id = stripe_session_id,
            "memory_transaction_completed"
        );

        Ok(())
    }
}
