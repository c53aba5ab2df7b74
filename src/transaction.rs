// ============================================================================
// Transaction Coordinator
// ============================================================================
//
// Builds a heterogeneous set of typed transaction members, submits them as
// one atomic unit, and classifies the backend's rejection into a typed
// failure carrying the members responsible. Attribution is positional:
// cancellation reason i belongs to submitted member i, and every attributed
// member carries its explicit index so the coupling stays auditable.
//
// The coordinator never retries internally; retryable kinds are flagged via
// `TxFailure::is_retryable` and left to the caller.
//
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::backend::{
    BackendError, CancellationCode, CancellationReason, StorageBackend, TransactItem,
    TransactWriteRequest,
};
use crate::core::{Expr, Item, Key, Result, StoreError};
use crate::marshal;

/// Hard backend limit on members per atomic transaction.
pub const MAX_TX_MEMBERS: usize = 25;

/// The operation one transaction member performs. The set is closed: an
/// unrecognized kind cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOp {
    /// Conditional put of a full record.
    Create { item: Item, expr: Expr },
    /// Conditional update of the record at `key`.
    Update { key: Key, expr: Expr },
    /// Conditional delete of the record at `key`.
    Delete { key: Key, expr: Expr },
    /// Asserts `expr` against the record at `key` without mutating it.
    ConditionCheck { key: Key, expr: Expr },
}

/// One member of an atomic transaction. Position in the submitted list is
/// semantically significant: the backend reports cancellation reasons in
/// the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct TxMember {
    /// Caller-chosen name for log and failure reporting.
    pub label: String,
    pub table: String,
    pub op: TxOp,
}

impl TxMember {
    /// Conditional-put member. Marshals the payload up front so a marshal
    /// failure surfaces before anything is submitted.
    pub fn create<T: Serialize>(
        label: impl Into<String>,
        table: impl Into<String>,
        payload: &T,
        expr: Expr,
    ) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            table: table.into(),
            op: TxOp::Create {
                item: marshal::marshal(payload)?,
                expr,
            },
        })
    }

    pub fn update(
        label: impl Into<String>,
        table: impl Into<String>,
        key: Key,
        expr: Expr,
    ) -> Self {
        Self {
            label: label.into(),
            table: table.into(),
            op: TxOp::Update { key, expr },
        }
    }

    pub fn delete(
        label: impl Into<String>,
        table: impl Into<String>,
        key: Key,
        expr: Expr,
    ) -> Self {
        Self {
            label: label.into(),
            table: table.into(),
            op: TxOp::Delete { key, expr },
        }
    }

    pub fn condition_check(
        label: impl Into<String>,
        table: impl Into<String>,
        key: Key,
        expr: Expr,
    ) -> Self {
        Self {
            label: label.into(),
            table: table.into(),
            op: TxOp::ConditionCheck { key, expr },
        }
    }
}

/// A member that caused the transaction to fail, with its position in the
/// submitted list.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedMember {
    pub index: usize,
    pub member: TxMember,
}

/// Classified transaction failure. `failed` is empty when no reliable
/// per-member attribution exists.
///
/// When several members fail their condition checks, every one of them is
/// attributed in `failed`, and the message carried by
/// [`StoreError::TxConditionCheckFailed`] is the last reason the backend
/// reported.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TxFailure {
    pub error: StoreError,
    pub failed: Vec<FailedMember>,
}

impl TxFailure {
    fn bare(error: StoreError) -> Self {
        Self {
            error,
            failed: Vec::new(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Generates a fresh idempotency token for a transaction submission.
pub fn new_request_token() -> String {
    Uuid::new_v4().to_string()
}

pub struct TransactionCoordinator<B> {
    backend: Arc<B>,
}

impl<B: StorageBackend> TransactionCoordinator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Submits the members as one atomic unit.
    ///
    /// All-or-nothing: either every member's condition held and every
    /// mutation applied, or nothing did and the returned failure names the
    /// members responsible where the backend attributed them.
    pub async fn submit(
        &self,
        members: &[TxMember],
        token: Option<String>,
    ) -> std::result::Result<(), TxFailure> {
        if members.len() > MAX_TX_MEMBERS {
            return Err(TxFailure::bare(StoreError::TxItemsExceedsLimit(
                members.len(),
            )));
        }

        let request = TransactWriteRequest {
            items: members.iter().map(to_transact_item).collect(),
            client_token: token,
        };

        match self.backend.transact_write(request).await {
            Ok(()) => Ok(()),
            Err(err) => Err(classify_tx_error(members, err)),
        }
    }
}

fn to_transact_item(member: &TxMember) -> TransactItem {
    let table = member.table.clone();
    match &member.op {
        TxOp::Create { item, expr } => TransactItem::Put {
            table,
            item: item.clone(),
            expr: expr.clone(),
        },
        TxOp::Update { key, expr } => TransactItem::Update {
            table,
            key: key.clone(),
            expr: expr.clone(),
        },
        TxOp::Delete { key, expr } => TransactItem::Delete {
            table,
            key: key.clone(),
            expr: expr.clone(),
        },
        TxOp::ConditionCheck { key, expr } => TransactItem::ConditionCheck {
            table,
            key: key.clone(),
            expr: expr.clone(),
        },
    }
}

fn classify_tx_error(members: &[TxMember], err: BackendError) -> TxFailure {
    match err {
        BackendError::TransactionCanceled { reasons } => classify_cancellation(members, &reasons),
        BackendError::TransactionConflict => TxFailure::bare(StoreError::TxConflict),
        BackendError::TransactionInProgress => TxFailure::bare(StoreError::TxInProgress),
        BackendError::BadRequest(message) => TxFailure::bare(StoreError::BadTxRequest(message)),
        BackendError::ResourceNotFound(resource) => {
            TxFailure::bare(StoreError::ResourceNotFound(resource))
        }
        other => TxFailure::bare(StoreError::Backend {
            op: "transact_write",
            source: other,
        }),
    }
}

fn classify_cancellation(members: &[TxMember], reasons: &[CancellationReason]) -> TxFailure {
    if reasons.len() != members.len() {
        // Positional attribution is unreliable; report the cancellation
        // without naming members rather than guessing.
        warn!(
            members = members.len(),
            reasons = reasons.len(),
            "cancellation reason count diverges from submitted members"
        );
        return TxFailure::bare(StoreError::Internal(format!(
            "transaction canceled with {} reasons for {} members",
            reasons.len(),
            members.len()
        )));
    }

    let mut checks = Vec::new();
    let mut throttled = Vec::new();
    let mut message = String::new();
    for (index, reason) in reasons.iter().enumerate() {
        match reason.code {
            CancellationCode::ConditionalCheckFailed => {
                if let Some(msg) = &reason.message {
                    message = msg.clone();
                }
                checks.push(FailedMember {
                    index,
                    member: members[index].clone(),
                });
            }
            CancellationCode::Throttling => {
                throttled.push(FailedMember {
                    index,
                    member: members[index].clone(),
                });
            }
            _ => {}
        }
    }

    if !checks.is_empty() {
        return TxFailure {
            error: StoreError::TxConditionCheckFailed(message),
            failed: checks,
        };
    }
    if !throttled.is_empty() {
        return TxFailure {
            error: StoreError::TxThrottled,
            failed: throttled,
        };
    }
    TxFailure::bare(StoreError::Internal(
        "transaction canceled without attributable member reasons".to_string(),
    ))
}
