//! SurrealDB implementation of [`RewardRepository`].
//!
//! `redeemed_count` and the `OutOfStock` flip are owned by the
//! redemption transaction, never written here.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::reward::{CreateReward, Reward, UpdateReward};
use patron_core::repository::{PaginatedResult, Pagination, RewardRepository};
use rust_decimal::Decimal;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{
    discount_kind_to_str, parse_discount_kind, parse_opt_uuid, parse_reward_kind,
    parse_reward_status, parse_uuid, reward_kind_to_str, reward_status_to_str,
};

const REWARD_FIELDS: &str = "\
    meta::id(id) AS record_id, tenant_id, name, description, kind, \
    points_required, discount_kind, discount_value, minimum_purchase, \
    has_stock_limit, total_stock, redeemed_count, has_expiration, \
    expires_at, limit_per_customer, validity_days, status, is_featured, \
    display_order, created_by, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct RewardRow {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    kind: String,
    points_required: i64,
    discount_kind: Option<String>,
    discount_value: Decimal,
    minimum_purchase: Decimal,
    has_stock_limit: bool,
    total_stock: i64,
    redeemed_count: i64,
    has_expiration: bool,
    expires_at: Option<DateTime<Utc>>,
    limit_per_customer: i64,
    validity_days: i64,
    status: String,
    is_featured: bool,
    display_order: i64,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RewardRow {
    fn try_into_reward(self) -> Result<Reward, DbError> {
        Ok(Reward {
            id: parse_uuid("reward", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            name: self.name,
            description: self.description,
            kind: parse_reward_kind(&self.kind)?,
            points_required: self.points_required,
            discount_kind: self
                .discount_kind
                .as_deref()
                .map(parse_discount_kind)
                .transpose()?,
            discount_value: self.discount_value,
            minimum_purchase: self.minimum_purchase,
            has_stock_limit: self.has_stock_limit,
            total_stock: self.total_stock,
            redeemed_count: self.redeemed_count,
            has_expiration: self.has_expiration,
            expires_at: self.expires_at,
            limit_per_customer: self.limit_per_customer,
            validity_days: self.validity_days,
            status: parse_reward_status(&self.status)?,
            is_featured: self.is_featured,
            display_order: self.display_order,
            created_by: parse_opt_uuid("customer", self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the reward repository.
#[derive(Clone)]
pub struct SurrealRewardRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRewardRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Reward, DbError> {
        let query = format!(
            "SELECT {REWARD_FIELDS} FROM type::record('reward', $id) \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<RewardRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "reward".into(),
            id: id.to_string(),
        })?;
        row.try_into_reward()
    }
}

impl<C: Connection> RewardRepository for SurrealRewardRepository<C> {
    async fn create(&self, input: CreateReward) -> CrmResult<Reward> {
        let id = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('reward', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 description = $description, kind = $kind, \
                 points_required = $points_required, \
                 discount_kind = $discount_kind, \
                 discount_value = $discount_value, \
                 minimum_purchase = $minimum_purchase, \
                 has_stock_limit = $has_stock_limit, \
                 total_stock = $total_stock, \
                 has_expiration = $has_expiration, \
                 expires_at = $expires_at, \
                 limit_per_customer = $limit_per_customer, \
                 validity_days = $validity_days, \
                 is_featured = $is_featured, \
                 display_order = $display_order, \
                 created_by = $created_by RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("kind", reward_kind_to_str(input.kind).to_string()))
            .bind(("points_required", input.points_required))
            .bind((
                "discount_kind",
                input
                    .discount_kind
                    .map(|k| discount_kind_to_str(k).to_string()),
            ))
            .bind(("discount_value", input.discount_value))
            .bind(("minimum_purchase", input.minimum_purchase))
            .bind(("has_stock_limit", input.total_stock.is_some()))
            .bind(("total_stock", input.total_stock.unwrap_or(0)))
            .bind(("has_expiration", input.expires_at.is_some()))
            .bind(("expires_at", input.expires_at))
            .bind(("limit_per_customer", input.limit_per_customer))
            .bind(("validity_days", input.validity_days))
            .bind(("is_featured", input.is_featured))
            .bind(("display_order", input.display_order))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| DbError::classify(e, "reward"))?;

        Ok(self.fetch(&tenant_id_str, &id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Reward> {
        Ok(self.fetch(&tenant_id.to_string(), &id.to_string()).await?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateReward) -> CrmResult<Reward> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.points_required.is_some() {
            sets.push("points_required = $points_required");
        }
        if input.discount_kind.is_some() {
            sets.push("discount_kind = $discount_kind");
        }
        if input.discount_value.is_some() {
            sets.push("discount_value = $discount_value");
        }
        if input.minimum_purchase.is_some() {
            sets.push("minimum_purchase = $minimum_purchase");
        }
        if input.total_stock.is_some() {
            sets.push("has_stock_limit = $has_stock_limit");
            sets.push("total_stock = $total_stock");
        }
        if input.expires_at.is_some() {
            sets.push("has_expiration = $has_expiration");
            sets.push("expires_at = $expires_at");
        }
        if input.limit_per_customer.is_some() {
            sets.push("limit_per_customer = $limit_per_customer");
        }
        if input.validity_days.is_some() {
            sets.push("validity_days = $validity_days");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.is_featured.is_some() {
            sets.push("is_featured = $is_featured");
        }
        if input.display_order.is_some() {
            sets.push("display_order = $display_order");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('reward', $id) SET {} \
             WHERE tenant_id = $tenant_id RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(points_required) = input.points_required {
            builder = builder.bind(("points_required", points_required));
        }
        if let Some(discount_kind) = input.discount_kind {
            builder = builder.bind((
                "discount_kind",
                discount_kind.map(|k| discount_kind_to_str(k).to_string()),
            ));
        }
        if let Some(discount_value) = input.discount_value {
            builder = builder.bind(("discount_value", discount_value));
        }
        if let Some(minimum_purchase) = input.minimum_purchase {
            builder = builder.bind(("minimum_purchase", minimum_purchase));
        }
        if let Some(total_stock) = input.total_stock {
            // Some(Some(n)) = enable limit at n, Some(None) = remove it
            builder = builder
                .bind(("has_stock_limit", total_stock.is_some()))
                .bind(("total_stock", total_stock.unwrap_or(0)));
        }
        if let Some(expires_at) = input.expires_at {
            builder = builder
                .bind(("has_expiration", expires_at.is_some()))
                .bind(("expires_at", expires_at));
        }
        if let Some(limit_per_customer) = input.limit_per_customer {
            builder = builder.bind(("limit_per_customer", limit_per_customer));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", reward_status_to_str(status).to_string()));
        }
        if let Some(validity_days) = input.validity_days {
            builder = builder.bind(("validity_days", validity_days));
        }
        if let Some(is_featured) = input.is_featured {
            builder = builder.bind(("is_featured", is_featured));
        }
        if let Some(display_order) = input.display_order {
            builder = builder.bind(("display_order", display_order));
        }

        let result = builder.await.map_err(DbError::from)?;
        result.check().map_err(|e| DbError::classify(e, "reward"))?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Reward>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM reward \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {REWARD_FIELDS} FROM reward \
             WHERE tenant_id = $tenant_id \
             ORDER BY display_order ASC, created_at ASC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RewardRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RewardRow::try_into_reward)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_active(&self, tenant_id: Uuid) -> CrmResult<Vec<Reward>> {
        let query = format!(
            "SELECT {REWARD_FIELDS} FROM reward \
             WHERE tenant_id = $tenant_id AND status = 'Active' \
             ORDER BY display_order ASC, created_at ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RewardRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(RewardRow::try_into_reward)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn count_member_redemptions(
        &self,
        tenant_id: Uuid,
        reward_id: Uuid,
        membership_id: Uuid,
    ) -> CrmResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM redemption \
                 WHERE tenant_id = $tenant_id AND reward_id = $reward_id \
                 AND membership_id = $membership_id \
                 AND status IN ['Pending', 'Approved', 'Used'] GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("reward_id", reward_id.to_string()))
            .bind(("membership_id", membership_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
