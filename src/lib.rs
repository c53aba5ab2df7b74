// ============================================================================
// docstore Library
// ============================================================================

pub mod backend;
pub mod batch;
pub mod core;
pub mod marshal;
pub mod retry;
pub mod transaction;

// Re-export main types for convenience
pub use backend::{BackendError, StorageBackend};
pub use batch::{BatchCoordinator, MAX_GET_BATCH, MAX_WRITE_BATCH};
pub use core::{Expr, Item, Key, Result, StoreError, Value, key};
pub use retry::{RetryPolicy, RetryState};
pub use transaction::{
    FailedMember, MAX_TX_MEMBERS, TransactionCoordinator, TxFailure, TxMember, TxOp,
    new_request_token,
};

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

// ============================================================================
// High-level Store API
// ============================================================================

/// Store client bundling the batch and transaction coordinators over one
/// shared backend handle.
///
/// This is the recommended entry point. The four operations below are the
/// complete caller-facing surface: bulk create, bulk delete, bulk get, and
/// atomic transaction submit.
///
/// # Examples
///
/// ```no_run
/// use docstore::{Store, StorageBackend, RetryPolicy, Value, key};
///
/// # async fn demo<B: StorageBackend>(backend: B) -> docstore::Result<()> {
/// let store = Store::with_policy(backend, RetryPolicy::default());
///
/// store
///     .batch_write_create("movies", &[serde_json::json!({"id": 1, "title": "Heat"})])
///     .await?;
///
/// let keys = [key([("id", Value::from(1i64))])];
/// let mut slots: Vec<Option<serde_json::Value>> = vec![None];
/// store.batch_get("movies", &keys, &mut slots).await?;
/// # Ok(())
/// # }
/// ```
pub struct Store<B> {
    batch: BatchCoordinator<B>,
    transactions: TransactionCoordinator<B>,
}

impl<B: StorageBackend> Store<B> {
    /// Creates a store with the default retry policy.
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    /// Creates a store with an explicit retry policy for the batch paths.
    pub fn with_policy(backend: B, policy: RetryPolicy) -> Self {
        let backend = Arc::new(backend);
        Self {
            batch: BatchCoordinator::with_policy(backend.clone(), policy),
            transactions: TransactionCoordinator::new(backend),
        }
    }

    /// Bulk-writes records. See [`BatchCoordinator::write_create`].
    pub async fn batch_write_create<T: Serialize>(&self, table: &str, items: &[T]) -> Result<()> {
        self.batch.write_create(table, items).await
    }

    /// Bulk-deletes records by key. See [`BatchCoordinator::write_delete`].
    pub async fn batch_write_delete(&self, table: &str, keys: &[Key]) -> Result<()> {
        self.batch.write_delete(table, keys).await
    }

    /// Bulk-reads records into per-key slots. See [`BatchCoordinator::get`].
    pub async fn batch_get<T: DeserializeOwned>(
        &self,
        table: &str,
        keys: &[Key],
        slots: &mut [Option<T>],
    ) -> Result<usize> {
        self.batch.get(table, keys, slots).await
    }

    /// Submits an atomic transaction. See [`TransactionCoordinator::submit`].
    pub async fn transact_write(
        &self,
        members: &[TxMember],
        token: Option<String>,
    ) -> std::result::Result<(), TxFailure> {
        self.transactions.submit(members, token).await
    }

    pub fn batch(&self) -> &BatchCoordinator<B> {
        &self.batch
    }

    pub fn transactions(&self) -> &TransactionCoordinator<B> {
        &self.transactions
    }
}
