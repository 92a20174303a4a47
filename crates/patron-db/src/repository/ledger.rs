//! SurrealDB implementation of [`LedgerRepository`].
//!
//! `record` writes the ledger row and the membership aggregate update
//! in one SurrealQL transaction, so a completed purchase is reflected
//! in the membership exactly once or not at all. The unique
//! (tenant, code) index rejects replays before any aggregate is
//! touched.

use chrono::{DateTime, Utc};
use patron_core::error::{CrmError, CrmResult};
use patron_core::models::transaction::{
    CreateTransaction, Transaction, TransactionKind, TransactionStatus,
};
use patron_core::repository::{LedgerRepository, PaginatedResult, Pagination};
use rust_decimal::Decimal;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{
    parse_opt_uuid, parse_payment_method, parse_transaction_kind, parse_transaction_status,
    parse_uuid, payment_method_to_str, transaction_kind_to_str, transaction_status_to_str,
};

const TRANSACTION_FIELDS: &str = "\
    meta::id(id) AS record_id, tenant_id, membership_id, kind, status, \
    amount, tax, total, payment_method, points_earned, points_redeemed, \
    code, description, processed_by, occurred_at, created_at";

#[derive(Debug, SurrealValue)]
struct TransactionRow {
    record_id: String,
    tenant_id: String,
    membership_id: String,
    kind: String,
    status: String,
    amount: Decimal,
    tax: Decimal,
    total: Decimal,
    payment_method: String,
    points_earned: i64,
    points_redeemed: i64,
    code: String,
    description: String,
    processed_by: Option<String>,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn try_into_transaction(self) -> Result<Transaction, DbError> {
        Ok(Transaction {
            id: parse_uuid("transaction", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            membership_id: parse_uuid("membership", &self.membership_id)?,
            kind: parse_transaction_kind(&self.kind)?,
            status: parse_transaction_status(&self.status)?,
            amount: self.amount,
            tax: self.tax,
            total: self.total,
            payment_method: parse_payment_method(&self.payment_method)?,
            points_earned: self.points_earned,
            points_redeemed: self.points_redeemed,
            code: self.code,
            description: self.description,
            processed_by: parse_opt_uuid("customer", self.processed_by)?,
            occurred_at: self.occurred_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the ledger repository.
#[derive(Clone)]
pub struct SurrealLedgerRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLedgerRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Transaction, DbError> {
        let query = format!(
            "SELECT {TRANSACTION_FIELDS} FROM type::record('transaction', $id) \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<TransactionRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "transaction".into(),
            id: id.to_string(),
        })?;
        row.try_into_transaction()
    }

    async fn membership_exists(&self, tenant_id: &str, membership_id: &str) -> Result<(), DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM \
                 type::record('membership', $membership_id) \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("membership_id", membership_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        if rows.first().map(|r| r.total).unwrap_or(0) == 0 {
            return Err(DbError::NotFound {
                entity: "membership".into(),
                id: membership_id.to_string(),
            });
        }
        Ok(())
    }
}

impl<C: Connection> LedgerRepository for SurrealLedgerRepository<C> {
    async fn record(&self, input: CreateTransaction) -> CrmResult<Transaction> {
        let id = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();
        let membership_id_str = input.membership_id.to_string();
        let occurred_at = Utc::now();

        self.membership_exists(&tenant_id_str, &membership_id_str)
            .await?;

        // The aggregate statement depends on what is being recorded:
        // completed purchases feed every aggregate, completed
        // adjustments only move points, everything else is a bare
        // ledger row. Both point-moving branches guard the net delta
        // so the balance can never go negative.
        let completed = input.status == TransactionStatus::Completed;
        let aggregate = match input.kind {
            TransactionKind::Purchase if completed => {
                "LET $m = (UPDATE type::record('membership', $membership_id) SET \
                 loyalty_points += $points_earned - $points_redeemed, \
                 total_purchases += $total, \
                 purchase_count += 1, \
                 last_purchase_at = $occurred_at, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id \
                 AND loyalty_points + $points_earned - $points_redeemed >= 0); \
                 IF array::len($m) == 0 { THROW 'insufficient_points' }; "
            }
            TransactionKind::Adjustment if completed => {
                "LET $m = (UPDATE type::record('membership', $membership_id) SET \
                 loyalty_points += $points_earned - $points_redeemed, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id \
                 AND loyalty_points + $points_earned - $points_redeemed >= 0); \
                 IF array::len($m) == 0 { THROW 'insufficient_points' }; "
            }
            _ => "",
        };

        let query = format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('transaction', $id) SET \
             tenant_id = $tenant_id, membership_id = $membership_id, \
             kind = $kind, status = $status, amount = $amount, \
             tax = $tax, total = $total, \
             payment_method = $payment_method, \
             points_earned = $points_earned, \
             points_redeemed = $points_redeemed, \
             code = $code, description = $description, \
             processed_by = $processed_by, occurred_at = $occurred_at \
             RETURN NONE; \
             {aggregate}\
             COMMIT TRANSACTION;"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("membership_id", membership_id_str))
            .bind(("kind", transaction_kind_to_str(input.kind).to_string()))
            .bind(("status", transaction_status_to_str(input.status).to_string()))
            .bind(("amount", input.amount))
            .bind(("tax", input.tax))
            .bind(("total", input.total))
            .bind((
                "payment_method",
                payment_method_to_str(input.payment_method).to_string(),
            ))
            .bind(("points_earned", input.points_earned))
            .bind(("points_redeemed", input.points_redeemed))
            .bind(("code", input.code))
            .bind(("description", input.description))
            .bind(("processed_by", input.processed_by.map(|u| u.to_string())))
            .bind(("occurred_at", occurred_at))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "transaction"))?;

        Ok(self.fetch(&tenant_id_str, &id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Transaction> {
        Ok(self.fetch(&tenant_id.to_string(), &id.to_string()).await?)
    }

    async fn get_by_code(&self, tenant_id: Uuid, code: &str) -> CrmResult<Transaction> {
        let query = format!(
            "SELECT {TRANSACTION_FIELDS} FROM transaction \
             WHERE tenant_id = $tenant_id AND code = $code"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<TransactionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "transaction".into(),
            id: format!("code={code}"),
        })?;
        Ok(row.try_into_transaction()?)
    }

    async fn mark_refunded(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Transaction> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        // Guarded transition: only completed purchases can move to
        // refunded. Amounts and points stay untouched.
        self.db
            .query(
                "UPDATE type::record('transaction', $id) SET \
                 status = 'Refunded' \
                 WHERE tenant_id = $tenant_id \
                 AND status = 'Completed' AND kind = 'Purchase' \
                 RETURN NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let tx = self.fetch(&tenant_id_str, &id_str).await?;
        if tx.status != TransactionStatus::Refunded {
            return Err(CrmError::Validation {
                message: "transaction is not refundable".into(),
            });
        }
        Ok(tx)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Transaction>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM transaction \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {TRANSACTION_FIELDS} FROM transaction \
             WHERE tenant_id = $tenant_id \
             ORDER BY occurred_at DESC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<TransactionRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(TransactionRow::try_into_transaction)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Transaction>> {
        let tenant_id_str = tenant_id.to_string();
        let membership_id_str = membership_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM transaction \
                 WHERE tenant_id = $tenant_id \
                 AND membership_id = $membership_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("membership_id", membership_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {TRANSACTION_FIELDS} FROM transaction \
             WHERE tenant_id = $tenant_id \
             AND membership_id = $membership_id \
             ORDER BY occurred_at DESC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("membership_id", membership_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<TransactionRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(TransactionRow::try_into_transaction)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
