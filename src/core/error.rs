use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection size exceeded: {0} items")]
    CollectionSizeExceeded(usize),

    #[error("Reference slot count ({slots}) does not match key count ({keys})")]
    ReferenceCountMismatch { keys: usize, slots: usize },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Max retries exceeded")]
    MaxRetriesExceeded,

    #[error("Transaction items exceed limit of 25: got {0}")]
    TxItemsExceedsLimit(usize),

    #[error("Transaction condition check failed: {0}")]
    TxConditionCheckFailed(String),

    #[error("Transaction throttled")]
    TxThrottled,

    #[error("Transaction conflict")]
    TxConflict,

    #[error("Transaction already in progress")]
    TxInProgress,

    #[error("Bad transaction request: {0}")]
    BadTxRequest(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Marshal error: {0}")]
    Marshal(String),

    #[error("{op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Returns `true` for errors that are safe to retry with the same input.
    ///
    /// Condition-check failures and validation errors are deliberately not
    /// retryable: the caller must change the request first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::TxThrottled | Self::TxConflict
        )
    }
}
