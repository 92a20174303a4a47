//! Membership domain model — the tenant-scoped projection of a customer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a customer within one tenant.
///
/// Everything except `Customer` is a staff role; behavior differences
/// go through [`MembershipRole::is_staff_member`] rather than string
/// comparison at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipRole {
    Owner,
    Admin,
    Manager,
    Staff,
    Customer,
}

impl MembershipRole {
    pub fn is_staff_member(&self) -> bool {
        !matches!(self, MembershipRole::Customer)
    }
}

/// Links one customer to one tenant, unique per (customer, tenant) pair.
///
/// Holds the tenant-scoped loyalty state. The aggregate fields
/// (`loyalty_points`, `total_purchases`, `purchase_count`,
/// `last_purchase_at`) are mutated only by the ledger and rewards
/// atomic operations — never by ad hoc field writes — so the storage
/// layer can keep them consistent under concurrent requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub role: MembershipRole,
    /// Never negative: debits are guarded by a sufficiency check inside
    /// the same transaction.
    pub loyalty_points: i64,
    pub total_purchases: Decimal,
    pub purchase_count: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub is_vip: bool,
    pub is_active: bool,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub push_notifications: bool,
    /// Internal staff notes, never shown to the customer.
    pub notes: String,
    /// Segmentation tags (e.g. `vip`, `frequent`).
    pub tags: Vec<String>,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub role: MembershipRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMembership {
    pub role: Option<MembershipRole>,
    pub is_vip: Option<bool>,
    pub is_active: Option<bool>,
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}
