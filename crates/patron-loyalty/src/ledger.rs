//! Ledger service — validates and completes transaction input before
//! handing it to the atomic repository write.

use patron_core::error::CrmError;
use patron_core::models::membership::Membership;
use patron_core::models::transaction::{
    CreateTransaction, PaymentMethod, Transaction, TransactionKind, TransactionStatus,
};
use patron_core::repository::{LedgerRepository, TenantRepository};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::error::{LoyaltyError, LoyaltyResult};

const TXN_CODE_CHARSET: &[u8] = b"0123456789ABCDEF";
const TXN_CODE_LEN: usize = 12;

/// Generate a `TXN-` transaction code (12 uppercase hex chars).
pub fn generate_transaction_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TXN_CODE_LEN)
        .map(|_| TXN_CODE_CHARSET[rng.random_range(0..TXN_CODE_CHARSET.len())] as char)
        .collect();
    format!("TXN-{suffix}")
}

/// Caller-facing transaction input; the service fills in the total,
/// points and code when omitted.
#[derive(Debug, Clone)]
pub struct RecordTransaction {
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub tax: Decimal,
    /// Defaults to `amount + tax`.
    pub total: Option<Decimal>,
    pub payment_method: PaymentMethod,
    /// Defaults to the points earned on the floored total at the
    /// tenant's configured rate (completed purchases only).
    pub points_earned: Option<i64>,
    pub points_redeemed: i64,
    /// Defaults to a generated `TXN-` code.
    pub code: Option<String>,
    pub description: String,
    pub processed_by: Option<Uuid>,
}

/// Ledger service.
///
/// Generic over repository implementations so that the loyalty layer
/// has no dependency on the database crate.
pub struct LedgerService<L: LedgerRepository, T: TenantRepository> {
    ledger_repo: L,
    tenant_repo: T,
}

impl<L: LedgerRepository, T: TenantRepository> LedgerService<L, T> {
    pub fn new(ledger_repo: L, tenant_repo: T) -> Self {
        Self {
            ledger_repo,
            tenant_repo,
        }
    }

    /// Record a ledger entry against a membership.
    ///
    /// Rejects negative amounts before any write. The repository applies
    /// the membership aggregate update in the same storage transaction
    /// as the row itself; a replayed code is rejected by the unique
    /// index and reported as [`LoyaltyError::DuplicateTransaction`]
    /// without touching any aggregate.
    pub async fn record(
        &self,
        membership: &Membership,
        input: RecordTransaction,
    ) -> LoyaltyResult<Transaction> {
        if input.amount < Decimal::ZERO {
            return Err(LoyaltyError::InvalidAmount(format!(
                "amount {} is negative",
                input.amount
            )));
        }
        if input.tax < Decimal::ZERO {
            return Err(LoyaltyError::InvalidAmount(format!(
                "tax {} is negative",
                input.tax
            )));
        }
        if input.points_redeemed < 0 {
            return Err(LoyaltyError::InvalidAmount(
                "points_redeemed is negative".into(),
            ));
        }

        let total = input.total.unwrap_or(input.amount + input.tax);

        let points_earned = match input.points_earned {
            Some(points) => points,
            None => {
                if input.kind == TransactionKind::Purchase
                    && input.status == TransactionStatus::Completed
                {
                    self.points_for_total(membership.tenant_id, total).await?
                } else {
                    0
                }
            }
        };

        let code = input.code.unwrap_or_else(generate_transaction_code);

        let transaction = self
            .ledger_repo
            .record(CreateTransaction {
                tenant_id: membership.tenant_id,
                membership_id: membership.id,
                kind: input.kind,
                status: input.status,
                amount: input.amount,
                tax: input.tax,
                total,
                payment_method: input.payment_method,
                points_earned,
                points_redeemed: input.points_redeemed,
                code: code.clone(),
                description: input.description,
                processed_by: input.processed_by,
            })
            .await
            .map_err(|e| match e {
                CrmError::AlreadyExists { .. } => LoyaltyError::DuplicateTransaction { code },
                other => LoyaltyError::Other(other),
            })?;

        tracing::info!(
            tenant_id = %membership.tenant_id,
            membership_id = %membership.id,
            code = %transaction.code,
            points_earned,
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// Transition a completed purchase to refunded.
    ///
    /// Deliberately does not reverse the earned points: an explicit
    /// adjustment transaction is the audit trail for point reversals.
    pub async fn mark_refunded(
        &self,
        tenant_id: Uuid,
        transaction_id: Uuid,
    ) -> LoyaltyResult<Transaction> {
        let transaction = self.ledger_repo.get_by_id(tenant_id, transaction_id).await?;
        if !transaction.is_refundable() {
            return Err(LoyaltyError::NotRefundable);
        }
        self.ledger_repo
            .mark_refunded(tenant_id, transaction_id)
            .await
            .map_err(|e| match e {
                CrmError::Validation { .. } => LoyaltyError::NotRefundable,
                other => LoyaltyError::Other(other),
            })
    }

    /// Points earned for a total: whole currency units times the
    /// tenant's configured rate, floored. Zero when loyalty is disabled
    /// for the tenant.
    async fn points_for_total(&self, tenant_id: Uuid, total: Decimal) -> LoyaltyResult<i64> {
        let settings = self.tenant_repo.get_settings(tenant_id).await?;
        if !settings.loyalty_enabled {
            return Ok(0);
        }
        let points = (total.trunc() * settings.points_per_currency_unit).trunc();
        Ok(points.to_i64().unwrap_or(0).max(0))
    }
}
