//! SurrealDB implementation of [`TenantRepository`].
//!
//! Tenant creation writes the tenant and its settings row in one
//! transaction so a tenant can never exist without settings.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::tenant::{
    CreateTenant, Tenant, TenantSettings, UpdateTenant, UpdateTenantSettings,
};
use patron_core::repository::{PaginatedResult, Pagination, TenantRepository};
use rust_decimal::Decimal;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{
    currency_position_to_str, parse_currency_position, parse_subscription_status, parse_uuid,
    subscription_status_to_str,
};

const TENANT_FIELDS: &str = "\
    meta::id(id) AS record_id, name, slug, business_email, \
    business_phone, currency_code, currency_symbol, currency_position, \
    currency_decimal_places, primary_color, secondary_color, logo_url, \
    subscription_status, trial_ends_at, max_customers, max_staff, \
    owner_id, is_active, created_at, updated_at";

const SETTINGS_FIELDS: &str = "\
    meta::id(id) AS record_id, tenant_id, allow_customer_registration, \
    require_email_verification, loyalty_enabled, \
    points_per_currency_unit, enable_email_notifications, \
    enable_push_notifications, enable_sms_notifications, \
    business_hours, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    business_email: String,
    business_phone: String,
    currency_code: String,
    currency_symbol: String,
    currency_position: String,
    currency_decimal_places: u32,
    primary_color: String,
    secondary_color: String,
    logo_url: Option<String>,
    subscription_status: String,
    trial_ends_at: Option<DateTime<Utc>>,
    max_customers: i64,
    max_staff: i64,
    owner_id: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            business_email: self.business_email,
            business_phone: self.business_phone,
            currency_code: self.currency_code,
            currency_symbol: self.currency_symbol,
            currency_position: parse_currency_position(&self.currency_position)?,
            currency_decimal_places: self.currency_decimal_places,
            primary_color: self.primary_color,
            secondary_color: self.secondary_color,
            logo_url: self.logo_url,
            subscription_status: parse_subscription_status(&self.subscription_status)?,
            trial_ends_at: self.trial_ends_at,
            max_customers: self.max_customers,
            max_staff: self.max_staff,
            owner_id: parse_uuid("owner", &self.owner_id)?,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct SettingsRow {
    record_id: String,
    tenant_id: String,
    allow_customer_registration: bool,
    require_email_verification: bool,
    loyalty_enabled: bool,
    points_per_currency_unit: Decimal,
    enable_email_notifications: bool,
    enable_push_notifications: bool,
    enable_sms_notifications: bool,
    business_hours: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SettingsRow {
    fn try_into_settings(self) -> Result<TenantSettings, DbError> {
        Ok(TenantSettings {
            id: parse_uuid("tenant_settings", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            allow_customer_registration: self.allow_customer_registration,
            require_email_verification: self.require_email_verification,
            loyalty_enabled: self.loyalty_enabled,
            points_per_currency_unit: self.points_per_currency_unit,
            enable_email_notifications: self.enable_email_notifications,
            enable_push_notifications: self.enable_push_notifications,
            enable_sms_notifications: self.enable_sms_notifications,
            business_hours: self.business_hours,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_tenant(&self, id: &str) -> Result<Tenant, DbError> {
        let query = format!(
            "SELECT {TENANT_FIELDS} FROM type::record('tenant', $id)"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<TenantRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id.to_string(),
        })?;
        row.try_into_tenant()
    }

    async fn fetch_settings(&self, tenant_id: &str) -> Result<TenantSettings, DbError> {
        let query = format!(
            "SELECT {SETTINGS_FIELDS} FROM tenant_settings \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<SettingsRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant_settings".into(),
            id: format!("tenant={tenant_id}"),
        })?;
        row.try_into_settings()
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> CrmResult<(Tenant, TenantSettings)> {
        let id = Uuid::new_v4().to_string();
        let settings_id = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, \
                 business_email = $business_email, \
                 owner_id = $owner_id \
                 RETURN NONE; \
                 CREATE type::record('tenant_settings', $settings_id) SET \
                 tenant_id = $id \
                 RETURN NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.clone()))
            .bind(("settings_id", settings_id))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("business_email", input.business_email))
            .bind(("owner_id", input.owner_id.to_string()))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "tenant"))?;

        let tenant = self.fetch_tenant(&id).await?;
        let settings = self.fetch_settings(&id).await?;
        Ok((tenant, settings))
    }

    async fn get_by_id(&self, id: Uuid) -> CrmResult<Tenant> {
        Ok(self.fetch_tenant(&id.to_string()).await?)
    }

    async fn get_by_slug(&self, slug: &str) -> CrmResult<Tenant> {
        let query = format!("SELECT {TENANT_FIELDS} FROM tenant WHERE slug = $slug");
        let mut result = self
            .db
            .query(&query)
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("slug={slug}"),
        })?;
        Ok(row.try_into_tenant()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> CrmResult<Tenant> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.business_email.is_some() {
            sets.push("business_email = $business_email");
        }
        if input.business_phone.is_some() {
            sets.push("business_phone = $business_phone");
        }
        if input.currency_code.is_some() {
            sets.push("currency_code = $currency_code");
        }
        if input.currency_symbol.is_some() {
            sets.push("currency_symbol = $currency_symbol");
        }
        if input.currency_position.is_some() {
            sets.push("currency_position = $currency_position");
        }
        if input.currency_decimal_places.is_some() {
            sets.push("currency_decimal_places = $currency_decimal_places");
        }
        if input.primary_color.is_some() {
            sets.push("primary_color = $primary_color");
        }
        if input.secondary_color.is_some() {
            sets.push("secondary_color = $secondary_color");
        }
        if input.logo_url.is_some() {
            sets.push("logo_url = $logo_url");
        }
        if input.subscription_status.is_some() {
            sets.push("subscription_status = $subscription_status");
        }
        if input.trial_ends_at.is_some() {
            sets.push("trial_ends_at = $trial_ends_at");
        }
        if input.max_customers.is_some() {
            sets.push("max_customers = $max_customers");
        }
        if input.max_staff.is_some() {
            sets.push("max_staff = $max_staff");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {} RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(business_email) = input.business_email {
            builder = builder.bind(("business_email", business_email));
        }
        if let Some(business_phone) = input.business_phone {
            builder = builder.bind(("business_phone", business_phone));
        }
        if let Some(currency_code) = input.currency_code {
            builder = builder.bind(("currency_code", currency_code));
        }
        if let Some(currency_symbol) = input.currency_symbol {
            builder = builder.bind(("currency_symbol", currency_symbol));
        }
        if let Some(position) = input.currency_position {
            builder = builder.bind((
                "currency_position",
                currency_position_to_str(position).to_string(),
            ));
        }
        if let Some(places) = input.currency_decimal_places {
            builder = builder.bind(("currency_decimal_places", places));
        }
        if let Some(primary_color) = input.primary_color {
            builder = builder.bind(("primary_color", primary_color));
        }
        if let Some(secondary_color) = input.secondary_color {
            builder = builder.bind(("secondary_color", secondary_color));
        }
        if let Some(logo_url) = input.logo_url {
            // Option<Option<String>>: Some(Some(v)) = set, Some(None) = clear
            builder = builder.bind(("logo_url", logo_url));
        }
        if let Some(status) = input.subscription_status {
            builder = builder.bind((
                "subscription_status",
                subscription_status_to_str(status).to_string(),
            ));
        }
        if let Some(trial_ends_at) = input.trial_ends_at {
            builder = builder.bind(("trial_ends_at", trial_ends_at));
        }
        if let Some(max_customers) = input.max_customers {
            builder = builder.bind(("max_customers", max_customers));
        }
        if let Some(max_staff) = input.max_staff {
            builder = builder.bind(("max_staff", max_staff));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::classify(e, "tenant"))?;

        Ok(self.fetch_tenant(&id_str).await?)
    }

    async fn deactivate(&self, id: Uuid) -> CrmResult<()> {
        self.db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 is_active = false, updated_at = time::now() RETURN NONE",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> CrmResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {TENANT_FIELDS} FROM tenant \
             ORDER BY created_at ASC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn get_settings(&self, tenant_id: Uuid) -> CrmResult<TenantSettings> {
        Ok(self.fetch_settings(&tenant_id.to_string()).await?)
    }

    async fn update_settings(
        &self,
        tenant_id: Uuid,
        input: UpdateTenantSettings,
    ) -> CrmResult<TenantSettings> {
        let tenant_id_str = tenant_id.to_string();

        let mut sets = Vec::new();
        if input.allow_customer_registration.is_some() {
            sets.push("allow_customer_registration = $allow_customer_registration");
        }
        if input.require_email_verification.is_some() {
            sets.push("require_email_verification = $require_email_verification");
        }
        if input.loyalty_enabled.is_some() {
            sets.push("loyalty_enabled = $loyalty_enabled");
        }
        if input.points_per_currency_unit.is_some() {
            sets.push("points_per_currency_unit = $points_per_currency_unit");
        }
        if input.enable_email_notifications.is_some() {
            sets.push("enable_email_notifications = $enable_email_notifications");
        }
        if input.enable_push_notifications.is_some() {
            sets.push("enable_push_notifications = $enable_push_notifications");
        }
        if input.enable_sms_notifications.is_some() {
            sets.push("enable_sms_notifications = $enable_sms_notifications");
        }
        if input.business_hours.is_some() {
            sets.push("business_hours = $business_hours");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE tenant_settings SET {} \
             WHERE tenant_id = $tenant_id RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str.clone()));

        if let Some(v) = input.allow_customer_registration {
            builder = builder.bind(("allow_customer_registration", v));
        }
        if let Some(v) = input.require_email_verification {
            builder = builder.bind(("require_email_verification", v));
        }
        if let Some(v) = input.loyalty_enabled {
            builder = builder.bind(("loyalty_enabled", v));
        }
        if let Some(v) = input.points_per_currency_unit {
            builder = builder.bind(("points_per_currency_unit", v));
        }
        if let Some(v) = input.enable_email_notifications {
            builder = builder.bind(("enable_email_notifications", v));
        }
        if let Some(v) = input.enable_push_notifications {
            builder = builder.bind(("enable_push_notifications", v));
        }
        if let Some(v) = input.enable_sms_notifications {
            builder = builder.bind(("enable_sms_notifications", v));
        }
        if let Some(v) = input.business_hours {
            builder = builder.bind(("business_hours", v));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::classify(e, "tenant_settings"))?;

        Ok(self.fetch_settings(&tenant_id_str).await?)
    }
}
