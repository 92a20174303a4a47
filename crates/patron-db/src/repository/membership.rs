//! SurrealDB implementation of [`MembershipRepository`].
//!
//! The aggregate fields (points, totals) are read here but only ever
//! written by the ledger/redemption atomic operations.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::membership::{CreateMembership, Membership, UpdateMembership};
use patron_core::models::notification::NotificationTarget;
use patron_core::repository::{MembershipRepository, PaginatedResult, Pagination};
use rust_decimal::Decimal;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{parse_role, parse_uuid, role_to_str};

const MEMBERSHIP_FIELDS: &str = "\
    meta::id(id) AS record_id, tenant_id, customer_id, role, \
    loyalty_points, total_purchases, purchase_count, last_purchase_at, \
    is_vip, is_active, email_notifications, sms_notifications, \
    push_notifications, notes, tags, joined_at, updated_at";

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    record_id: String,
    tenant_id: String,
    customer_id: String,
    role: String,
    loyalty_points: i64,
    total_purchases: Decimal,
    purchase_count: i64,
    last_purchase_at: Option<DateTime<Utc>>,
    is_vip: bool,
    is_active: bool,
    email_notifications: bool,
    sms_notifications: bool,
    push_notifications: bool,
    notes: String,
    tags: Vec<String>,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    fn try_into_membership(self) -> Result<Membership, DbError> {
        Ok(Membership {
            id: parse_uuid("membership", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            customer_id: parse_uuid("customer", &self.customer_id)?,
            role: parse_role(&self.role)?,
            loyalty_points: self.loyalty_points,
            total_purchases: self.total_purchases,
            purchase_count: self.purchase_count,
            last_purchase_at: self.last_purchase_at,
            is_vip: self.is_vip,
            is_active: self.is_active,
            email_notifications: self.email_notifications,
            sms_notifications: self.sms_notifications,
            push_notifications: self.push_notifications,
            notes: self.notes,
            tags: self.tags,
            joined_at: self.joined_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Membership, DbError> {
        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM type::record('membership', $id) \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<MembershipRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "membership".into(),
            id: id.to_string(),
        })?;
        row.try_into_membership()
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create(&self, input: CreateMembership) -> CrmResult<Membership> {
        let id = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('membership', $id) SET \
                 tenant_id = $tenant_id, customer_id = $customer_id, \
                 role = $role RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("customer_id", input.customer_id.to_string()))
            .bind(("role", role_to_str(input.role).to_string()))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "membership"))?;

        Ok(self.fetch(&tenant_id_str, &id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Membership> {
        Ok(self.fetch(&tenant_id.to_string(), &id.to_string()).await?)
    }

    async fn get_by_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> CrmResult<Membership> {
        let customer_id_str = customer_id.to_string();
        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM membership \
             WHERE tenant_id = $tenant_id AND customer_id = $customer_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("customer_id", customer_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "membership".into(),
            id: format!("customer={customer_id_str}"),
        })?;
        Ok(row.try_into_membership()?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateMembership,
    ) -> CrmResult<Membership> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        let mut sets = Vec::new();
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.is_vip.is_some() {
            sets.push("is_vip = $is_vip");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.email_notifications.is_some() {
            sets.push("email_notifications = $email_notifications");
        }
        if input.sms_notifications.is_some() {
            sets.push("sms_notifications = $sms_notifications");
        }
        if input.push_notifications.is_some() {
            sets.push("push_notifications = $push_notifications");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }
        if input.tags.is_some() {
            sets.push("tags = $tags");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('membership', $id) SET {} \
             WHERE tenant_id = $tenant_id RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()));

        if let Some(role) = input.role {
            builder = builder.bind(("role", role_to_str(role).to_string()));
        }
        if let Some(is_vip) = input.is_vip {
            builder = builder.bind(("is_vip", is_vip));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(v) = input.email_notifications {
            builder = builder.bind(("email_notifications", v));
        }
        if let Some(v) = input.sms_notifications {
            builder = builder.bind(("sms_notifications", v));
        }
        if let Some(v) = input.push_notifications {
            builder = builder.bind(("push_notifications", v));
        }
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }
        if let Some(tags) = input.tags {
            builder = builder.bind(("tags", tags));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::classify(e, "membership"))?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }

    async fn remove(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<()> {
        self.db
            .query(
                "DELETE type::record('membership', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Membership>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM membership \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM membership \
             WHERE tenant_id = $tenant_id \
             ORDER BY joined_at ASC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(MembershipRow::try_into_membership)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_audience(
        &self,
        tenant_id: Uuid,
        target: &NotificationTarget,
    ) -> CrmResult<Vec<Membership>> {
        // Base set: active end-customer memberships of the tenant. The
        // explicit id list replaces the base set when `all` is false;
        // VIP and point-range filters intersect whatever remains.
        let mut conditions = vec![
            "tenant_id = $tenant_id",
            "role = 'Customer'",
            "is_active = true",
        ];
        if !target.all {
            conditions.push("meta::id(id) IN $membership_ids");
        }
        if target.vip_only {
            conditions.push("is_vip = true");
        }
        if target.min_points.is_some() {
            conditions.push("loyalty_points >= $min_points");
        }
        if target.max_points.is_some() {
            conditions.push("loyalty_points <= $max_points");
        }

        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM membership WHERE {} \
             ORDER BY joined_at ASC",
            conditions.join(" AND ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()));
        if !target.all {
            let ids: Vec<String> = target.membership_ids.iter().map(Uuid::to_string).collect();
            builder = builder.bind(("membership_ids", ids));
        }
        if let Some(min_points) = target.min_points {
            builder = builder.bind(("min_points", min_points));
        }
        if let Some(max_points) = target.max_points {
            builder = builder.bind(("max_points", max_points));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(MembershipRow::try_into_membership)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
