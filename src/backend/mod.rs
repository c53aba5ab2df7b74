//! Backend client seam.
//!
//! The coordinators depend only on this trait and the shapes defined here:
//! the unprocessed-remainder fields of the batch responses, the typed
//! exception taxonomy, and the positional cancellation reasons of a
//! canceled transaction. Wire transport, credentials, and table lifecycle
//! live behind the implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{Expr, Item, Key};

/// One member of a batch write: put a full record or delete by key.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(Key),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteRequest {
    pub table: String,
    pub requests: Vec<WriteRequest>,
}

/// `unprocessed` carries the members the backend did not apply; the
/// coordinator re-submits exactly that remainder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteResponse {
    pub unprocessed: Vec<WriteRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetRequest {
    pub table: String,
    pub keys: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResponse {
    /// Returned records, in server response order.
    pub items: Vec<Item>,
    /// Keys the backend did not read this round.
    pub unprocessed: Vec<Key>,
}

/// One member of an atomic transaction, already in wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    Put {
        table: String,
        item: Item,
        expr: Expr,
    },
    Update {
        table: String,
        key: Key,
        expr: Expr,
    },
    Delete {
        table: String,
        key: Key,
        expr: Expr,
    },
    ConditionCheck {
        table: String,
        key: Key,
        expr: Expr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactWriteRequest {
    pub items: Vec<TransactItem>,
    /// Idempotency token; the backend rejects a duplicate token with
    /// [`BackendError::TransactionInProgress`] while the original runs.
    pub client_token: Option<String>,
}

/// Per-member outcome of a canceled transaction. Reason `i` corresponds to
/// submitted item `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationReason {
    pub code: CancellationCode,
    pub message: Option<String>,
}

impl CancellationReason {
    pub fn ok() -> Self {
        Self {
            code: CancellationCode::None,
            message: None,
        }
    }

    pub fn new(code: CancellationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationCode {
    /// The member itself was fine; another member canceled the transaction.
    None,
    ConditionalCheckFailed,
    Throttling,
    Other(String),
}

/// Exception taxonomy reported by the backend client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Provisioned throughput exceeded")]
    ThroughputExceeded,

    #[error("Request limit exceeded")]
    RequestLimitExceeded,

    /// Reported by real clients when a single conditional write fails its
    /// condition. The batch paths carry no conditions, so the coordinator
    /// surfaces it as a wrapped, non-retryable backend error.
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    #[error("Transaction canceled")]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    #[error("Transaction conflict")]
    TransactionConflict,

    #[error("Transaction in progress")]
    TransactionInProgress,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend internal error: {0}")]
    Internal(String),
}

impl BackendError {
    /// Throttling-class errors; safe to retry the same input after backoff.
    pub fn is_throttle(&self) -> bool {
        matches!(
            self,
            Self::ThroughputExceeded | Self::RequestLimitExceeded
        )
    }
}

/// Synchronous request/response surface of the document store.
///
/// Implementations wrap a real client; tests provide scripted fakes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn batch_write(
        &self,
        request: BatchWriteRequest,
    ) -> std::result::Result<BatchWriteResponse, BackendError>;

    async fn batch_get(
        &self,
        request: BatchGetRequest,
    ) -> std::result::Result<BatchGetResponse, BackendError>;

    async fn transact_write(
        &self,
        request: TransactWriteRequest,
    ) -> std::result::Result<(), BackendError>;
}
