//! Tenant domain model.
//!
//! A tenant is a business using the platform, addressed by subdomain.
//! Every other domain entity is scoped to exactly one tenant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Suspended,
    Cancelled,
}

/// Where the currency symbol is placed when formatting amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyPosition {
    Before,
    After,
}

/// A business/organization using the platform.
///
/// Tenants are never hard-deleted; deactivation sets `is_active = false`.
/// The slug doubles as the subdomain and is immutable after creation
/// (there is deliberately no slug field on [`UpdateTenant`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Business name.
    pub name: String,
    /// URL-safe unique identifier, lowercase `[a-z0-9-]+`
    /// (e.g. `simifood` for `simifood.patroncrm.com`).
    pub slug: String,
    pub business_email: String,
    pub business_phone: String,
    /// ISO 4217 code (e.g. `USD`, `NGN`).
    pub currency_code: String,
    pub currency_symbol: String,
    pub currency_position: CurrencyPosition,
    pub currency_decimal_places: u32,
    /// Hex brand colors.
    pub primary_color: String,
    pub secondary_color: String,
    pub logo_url: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub max_customers: i64,
    pub max_staff: i64,
    /// Primary business owner (customer id).
    pub owner_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Whether tenant-scoped requests may be served at all.
    /// Past-due, suspended and cancelled tenants are locked out.
    pub fn subscription_allows_access(&self) -> bool {
        matches!(
            self.subscription_status,
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        )
    }

    pub fn is_trial(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Trial
    }

    /// Format a monetary amount using the tenant's currency settings,
    /// for rendering by the dashboard/reporting layers.
    pub fn format_amount(&self, amount: Decimal) -> String {
        let formatted = amount.round_dp(self.currency_decimal_places);
        match self.currency_position {
            CurrencyPosition::Before => format!("{}{}", self.currency_symbol, formatted),
            CurrencyPosition::After => format!("{}{}", formatted, self.currency_symbol),
        }
    }
}

/// Fields required to create a new tenant.
///
/// Currency, branding, limits and subscription state start from platform
/// defaults (USD, trial, 100 customers, 3 staff) and are adjusted via
/// [`UpdateTenant`] afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub business_email: String,
    pub owner_id: Uuid,
}

/// Fields that can be updated on an existing tenant. The slug is not
/// updatable: running domain bindings reference it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub business_email: Option<String>,
    pub business_phone: Option<String>,
    pub currency_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub currency_position: Option<CurrencyPosition>,
    pub currency_decimal_places: Option<u32>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    /// `Some(Some(url))` = set, `Some(None)` = clear, `None` = no change.
    pub logo_url: Option<Option<String>>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<Option<DateTime<Utc>>>,
    pub max_customers: Option<i64>,
    pub max_staff: Option<i64>,
}

/// Per-tenant configuration, one-to-one with [`Tenant`].
///
/// Created in the same transaction as the tenant itself, so every tenant
/// has exactly one settings record from the moment it exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub allow_customer_registration: bool,
    pub require_email_verification: bool,
    pub loyalty_enabled: bool,
    /// Loyalty points issued per whole currency unit spent.
    pub points_per_currency_unit: Decimal,
    pub enable_email_notifications: bool,
    pub enable_push_notifications: bool,
    pub enable_sms_notifications: bool,
    /// Opening hours, free-form JSON (rendered by the dashboard).
    pub business_hours: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenantSettings {
    pub allow_customer_registration: Option<bool>,
    pub require_email_verification: Option<bool>,
    pub loyalty_enabled: Option<bool>,
    pub points_per_currency_unit: Option<Decimal>,
    pub enable_email_notifications: Option<bool>,
    pub enable_push_notifications: Option<bool>,
    pub enable_sms_notifications: Option<bool>,
    pub business_hours: Option<serde_json::Value>,
}
