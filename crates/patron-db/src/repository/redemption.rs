//! SurrealDB implementation of [`RedemptionRepository`].
//!
//! Every state transition runs as one SurrealQL transaction. The
//! redeem path re-checks all preconditions inside the transaction and
//! `THROW`s a guard code when one fails, so concurrent requests can
//! never overspend points, oversell stock or exceed a per-customer
//! limit, no matter what the service layer saw beforehand.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::redemption::{CreateRedemption, Redemption};
use patron_core::repository::{PaginatedResult, Pagination, RedemptionRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{
    parse_opt_uuid, parse_redemption_status, parse_uuid, redemption_status_to_str,
};

const REDEMPTION_FIELDS: &str = "\
    meta::id(id) AS record_id, code, tenant_id, reward_id, \
    membership_id, points_spent, status, valid_from, valid_until, \
    used_at, used_by, transaction_id, rejection_reason, redeemed_at, \
    updated_at";

#[derive(Debug, SurrealValue)]
struct RedemptionRow {
    record_id: String,
    code: String,
    tenant_id: String,
    reward_id: String,
    membership_id: String,
    points_spent: i64,
    status: String,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
    used_by: Option<String>,
    transaction_id: Option<String>,
    rejection_reason: String,
    redeemed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RedemptionRow {
    fn try_into_redemption(self) -> Result<Redemption, DbError> {
        Ok(Redemption {
            id: parse_uuid("redemption", &self.record_id)?,
            code: self.code,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            reward_id: parse_uuid("reward", &self.reward_id)?,
            membership_id: parse_uuid("membership", &self.membership_id)?,
            points_spent: self.points_spent,
            status: parse_redemption_status(&self.status)?,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            used_at: self.used_at,
            used_by: parse_opt_uuid("customer", self.used_by)?,
            transaction_id: parse_opt_uuid("transaction", self.transaction_id)?,
            rejection_reason: self.rejection_reason,
            redeemed_at: self.redeemed_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}

/// SurrealDB implementation of the redemption repository.
#[derive(Clone)]
pub struct SurrealRedemptionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRedemptionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Redemption, DbError> {
        let query = format!(
            "SELECT {REDEMPTION_FIELDS} FROM type::record('redemption', $id) \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<RedemptionRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "redemption".into(),
            id: id.to_string(),
        })?;
        row.try_into_redemption()
    }

    /// Terminal transition shared by cancel and reject; when
    /// `refund_points` is set, the re-credit and the stock decrement
    /// ride in the same transaction as the status change.
    async fn close_out(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: &str,
        reason: Option<&str>,
        refund_points: bool,
    ) -> CrmResult<Redemption> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        let reason_set = if reason.is_some() {
            ", rejection_reason = $reason"
        } else {
            ""
        };
        let refund = if refund_points {
            "UPDATE type::record('membership', $red[0].membership_id) SET \
             loyalty_points += $red[0].points_spent, \
             updated_at = time::now(); \
             UPDATE type::record('reward', $red[0].reward_id) SET \
             redeemed_count = math::max([redeemed_count - 1, 0]), \
             updated_at = time::now(); "
        } else {
            ""
        };

        let query = format!(
            "BEGIN TRANSACTION; \
             LET $red = (UPDATE type::record('redemption', $id) SET \
             status = $new_status{reason_set}, updated_at = time::now() \
             WHERE tenant_id = $tenant_id \
             AND status IN ['Pending', 'Approved']); \
             IF array::len($red) == 0 {{ \
             THROW 'redemption_not_refundable' }}; \
             {refund}\
             COMMIT TRANSACTION;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("new_status", status.to_string()));
        if let Some(reason) = reason {
            builder = builder.bind(("reason", reason.to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::classify(e, "redemption"))?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }
}

impl<C: Connection> RedemptionRepository for SurrealRedemptionRepository<C> {
    async fn redeem(&self, input: CreateRedemption) -> CrmResult<Redemption> {
        let id = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();

        // Guard order: per-customer limit, point debit, reward
        // availability. Any THROW cancels the whole transaction.
        let query = "\
            BEGIN TRANSACTION; \
            IF $limit > 0 { \
            LET $used = (SELECT count() AS total FROM redemption \
            WHERE tenant_id = $tenant_id AND reward_id = $reward_id \
            AND membership_id = $membership_id \
            AND status IN ['Pending', 'Approved', 'Used'] GROUP ALL); \
            IF array::len($used) > 0 AND $used[0].total >= $limit { \
            THROW 'redemption_limit_reached' }; \
            }; \
            LET $m = (UPDATE type::record('membership', $membership_id) SET \
            loyalty_points -= $points, updated_at = time::now() \
            WHERE tenant_id = $tenant_id AND loyalty_points >= $points); \
            IF array::len($m) == 0 { THROW 'insufficient_points' }; \
            LET $r = (UPDATE type::record('reward', $reward_id) SET \
            redeemed_count += 1, updated_at = time::now() \
            WHERE tenant_id = $tenant_id AND status = 'Active' \
            AND (!has_stock_limit OR redeemed_count < total_stock) \
            AND (!has_expiration OR expires_at = NONE \
            OR expires_at >= time::now())); \
            IF array::len($r) == 0 { THROW 'reward_unavailable' }; \
            UPDATE type::record('reward', $reward_id) SET \
            status = 'OutOfStock' \
            WHERE has_stock_limit AND redeemed_count >= total_stock; \
            CREATE type::record('redemption', $id) SET \
            code = $code, tenant_id = $tenant_id, \
            reward_id = $reward_id, membership_id = $membership_id, \
            points_spent = $points, status = $status, \
            valid_from = $valid_from, valid_until = $valid_until \
            RETURN NONE; \
            COMMIT TRANSACTION;";

        let result = self
            .db
            .query(query)
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("reward_id", input.reward_id.to_string()))
            .bind(("membership_id", input.membership_id.to_string()))
            .bind(("points", input.points_spent))
            .bind(("limit", input.limit_per_customer))
            .bind(("code", input.code))
            .bind(("status", redemption_status_to_str(input.status).to_string()))
            .bind(("valid_from", input.valid_from))
            .bind(("valid_until", input.valid_until))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "redemption"))?;

        Ok(self.fetch(&tenant_id_str, &id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Redemption> {
        Ok(self.fetch(&tenant_id.to_string(), &id.to_string()).await?)
    }

    async fn get_by_code(&self, tenant_id: Uuid, code: &str) -> CrmResult<Redemption> {
        let query = format!(
            "SELECT {REDEMPTION_FIELDS} FROM redemption \
             WHERE tenant_id = $tenant_id AND code = $code"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RedemptionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "redemption".into(),
            id: format!("code={code}"),
        })?;
        Ok(row.try_into_redemption()?)
    }

    async fn cancel(&self, tenant_id: Uuid, id: Uuid, refund_points: bool) -> CrmResult<Redemption> {
        self.close_out(tenant_id, id, "Cancelled", None, refund_points)
            .await
    }

    async fn reject(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: &str,
        refund_points: bool,
    ) -> CrmResult<Redemption> {
        self.close_out(tenant_id, id, "Rejected", Some(reason), refund_points)
            .await
    }

    async fn mark_used(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        staff_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> CrmResult<Redemption> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        let query = "\
            BEGIN TRANSACTION; \
            LET $red = (UPDATE type::record('redemption', $id) SET \
            status = 'Used', used_at = time::now(), \
            used_by = $staff_id, transaction_id = $transaction_id, \
            updated_at = time::now() \
            WHERE tenant_id = $tenant_id \
            AND status IN ['Pending', 'Approved'] \
            AND valid_from <= time::now() \
            AND (valid_until = NONE OR valid_until >= time::now())); \
            IF array::len($red) == 0 { THROW 'redemption_not_usable' }; \
            COMMIT TRANSACTION;";

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("staff_id", staff_id.to_string()))
            .bind(("transaction_id", transaction_id.map(|t| t.to_string())))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "redemption"))?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }

    async fn expire_due(&self, tenant_id: Uuid, now: DateTime<Utc>) -> CrmResult<u64> {
        let mut result = self
            .db
            .query(
                "UPDATE redemption SET status = 'Expired', \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id \
                 AND status IN ['Pending', 'Approved'] \
                 AND valid_until != NONE AND valid_until < $now \
                 RETURN meta::id(id) AS record_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    async fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Redemption>> {
        let tenant_id_str = tenant_id.to_string();
        let membership_id_str = membership_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM redemption \
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
            "SELECT {REDEMPTION_FIELDS} FROM redemption \
             WHERE tenant_id = $tenant_id \
             AND membership_id = $membership_id \
             ORDER BY redeemed_at DESC LIMIT $limit START $offset"
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
        let rows: Vec<RedemptionRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RedemptionRow::try_into_redemption)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
