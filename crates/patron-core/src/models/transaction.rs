//! Transaction domain model — one entry in the append-only ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Purchase,
    Refund,
    /// Manual loyalty-point correction; this is also the mechanism for
    /// reversing points after a refund (refunds themselves never touch
    /// the point balance).
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Completed,
    Pending,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    Other,
}

/// An immutable ledger entry against one membership.
///
/// Once written, only the status may change (completed → refunded);
/// amounts and points are fixed. A completed purchase is reflected in
/// the owning membership's aggregates exactly once — replaying the same
/// transaction code is rejected by the unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub membership_id: Uuid,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub tax: Decimal,
    /// `amount + tax`.
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub points_earned: i64,
    pub points_redeemed: i64,
    /// Globally unique code (`TXN-` + 12 hex chars), the idempotency key.
    pub code: String,
    pub description: String,
    /// Staff member who processed the transaction.
    pub processed_by: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_refundable(&self) -> bool {
        self.status == TransactionStatus::Completed && self.kind == TransactionKind::Purchase
    }
}

/// Fully-resolved input for the atomic ledger write.
///
/// Callers go through `LedgerService::record`, which fills in defaults
/// (total, points, code) before handing this to the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub tenant_id: Uuid,
    pub membership_id: Uuid,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub code: String,
    pub description: String,
    pub processed_by: Option<Uuid>,
}
