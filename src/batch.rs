// ============================================================================
// Batch Coordinator
// ============================================================================
//
// Drives bulk writes, deletes, and multi-gets to completion against a
// backend that may report part of each request as unprocessed. Every retry
// round goes through the backoff policy, so a remainder that never shrinks
// ends in MaxRetriesExceeded rather than an unbounded loop. The coordinator
// never reports success while any input member remains unprocessed.
//
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::{
    BackendError, BatchGetRequest, BatchWriteRequest, StorageBackend, WriteRequest,
};
use crate::core::{Item, Key, Result, StoreError};
use crate::marshal;
use crate::retry::RetryPolicy;

/// Hard backend limit on members per batch write or delete.
pub const MAX_WRITE_BATCH: usize = 25;
/// Hard backend limit on keys per multi-get.
pub const MAX_GET_BATCH: usize = 100;

pub struct BatchCoordinator<B> {
    backend: Arc<B>,
    policy: RetryPolicy,
}

impl<B: StorageBackend> BatchCoordinator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    pub fn with_policy(backend: Arc<B>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Writes up to [`MAX_WRITE_BATCH`] records, retrying the unprocessed
    /// remainder until the backend accepts everything or the retry policy
    /// is exhausted.
    pub async fn write_create<T: Serialize>(&self, table: &str, items: &[T]) -> Result<()> {
        if items.len() > MAX_WRITE_BATCH {
            return Err(StoreError::CollectionSizeExceeded(items.len()));
        }

        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            requests.push(WriteRequest::Put(marshal::marshal(item)?));
        }

        self.drive_writes("batch_write_create", table, requests)
            .await
    }

    /// Deletes up to [`MAX_WRITE_BATCH`] records by key. Empty keys are
    /// skipped silently.
    pub async fn write_delete(&self, table: &str, keys: &[Key]) -> Result<()> {
        if keys.len() > MAX_WRITE_BATCH {
            return Err(StoreError::CollectionSizeExceeded(keys.len()));
        }

        let requests = keys
            .iter()
            .filter(|key| !key.is_empty())
            .cloned()
            .map(WriteRequest::Delete)
            .collect();

        self.drive_writes("batch_write_delete", table, requests)
            .await
    }

    /// Reads up to [`MAX_GET_BATCH`] records, filling one destination slot
    /// per key. Returned records are matched to slots by key, not by
    /// response order; keys the backend holds no record for leave their
    /// slot as `None`. Returns the number of slots filled.
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        keys: &[Key],
        slots: &mut [Option<T>],
    ) -> Result<usize> {
        if keys.len() > MAX_GET_BATCH {
            return Err(StoreError::CollectionSizeExceeded(keys.len()));
        }
        if keys.len() != slots.len() {
            return Err(StoreError::ReferenceCountMismatch {
                keys: keys.len(),
                slots: slots.len(),
            });
        }

        let mut pending: Vec<Key> = keys.iter().filter(|key| !key.is_empty()).cloned().collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let op = "batch_get";
        let mut state = self.policy.new_state();
        let mut filled = 0usize;
        loop {
            let request = BatchGetRequest {
                table: table.to_string(),
                keys: pending.clone(),
            };
            match self.backend.batch_get(request).await {
                Ok(response) => {
                    for item in &response.items {
                        match slot_for(keys, slots, item) {
                            Some(index) => {
                                slots[index] = Some(marshal::unmarshal(item)?);
                                filled += 1;
                            }
                            None => {
                                warn!(op, "returned record matches no pending slot, skipping")
                            }
                        }
                    }
                    if response.unprocessed.is_empty() {
                        return Ok(filled);
                    }
                    debug!(
                        op,
                        unprocessed = response.unprocessed.len(),
                        "backend left keys unprocessed, backing off"
                    );
                    pending = response.unprocessed;
                    self.policy.backoff(&mut state).await?;
                }
                Err(err) => {
                    let classified = classify_backend_error(op, err);
                    if !classified.is_retryable() {
                        return Err(classified);
                    }
                    warn!(op, error = %classified, "retryable backend error, backing off");
                    self.policy.backoff(&mut state).await?;
                }
            }
        }
    }

    async fn drive_writes(
        &self,
        op: &'static str,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let mut state = self.policy.new_state();
        let mut pending = requests;
        loop {
            let request = BatchWriteRequest {
                table: table.to_string(),
                requests: pending.clone(),
            };
            match self.backend.batch_write(request).await {
                Ok(response) => {
                    if response.unprocessed.is_empty() {
                        return Ok(());
                    }
                    debug!(
                        op,
                        unprocessed = response.unprocessed.len(),
                        "backend left members unprocessed, backing off"
                    );
                    pending = response.unprocessed;
                    self.policy.backoff(&mut state).await?;
                }
                Err(err) => {
                    let classified = classify_backend_error(op, err);
                    if !classified.is_retryable() {
                        return Err(classified);
                    }
                    // Retry the last known unprocessed set unchanged.
                    warn!(op, error = %classified, "retryable backend error, backing off");
                    self.policy.backoff(&mut state).await?;
                }
            }
        }
    }
}

fn classify_backend_error(op: &'static str, err: BackendError) -> StoreError {
    if err.is_throttle() {
        return StoreError::RateLimitExceeded;
    }
    match err {
        BackendError::ResourceNotFound(resource) => StoreError::ResourceNotFound(resource),
        other => StoreError::Backend { op, source: other },
    }
}

/// Finds the unfilled slot whose key attributes all match the returned
/// record.
fn slot_for<T>(keys: &[Key], slots: &[Option<T>], item: &Item) -> Option<usize> {
    keys.iter()
        .enumerate()
        .find(|(index, key)| {
            slots[*index].is_none()
                && !key.is_empty()
                && key
                    .iter()
                    .all(|(name, value)| item.get(name) == Some(value))
        })
        .map(|(index, _)| index)
}
