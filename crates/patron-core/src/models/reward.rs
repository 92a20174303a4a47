//! Reward domain model — a tenant's loyalty catalog item.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    Discount,
    Product,
    Gift,
    Upgrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardStatus {
    Active,
    Inactive,
    Expired,
    /// Set automatically inside the redeem transaction when
    /// `redeemed_count` reaches `total_stock`.
    OutOfStock,
}

/// A redeemable catalog item.
///
/// `redeemed_count` never exceeds `total_stock` while `has_stock_limit`
/// is set; the increment is guarded inside the redeem transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: RewardKind,
    pub points_required: i64,
    /// Discount parameters, only meaningful for `RewardKind::Discount`.
    pub discount_kind: Option<DiscountKind>,
    pub discount_value: Decimal,
    pub minimum_purchase: Decimal,
    pub has_stock_limit: bool,
    pub total_stock: i64,
    pub redeemed_count: i64,
    pub has_expiration: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Maximum redemptions per customer, 0 = unlimited. Counts
    /// pending/approved/used redemptions.
    pub limit_per_customer: i64,
    /// Days a redemption stays valid after claiming, 0 = no expiry.
    pub validity_days: i64,
    pub status: RewardStatus,
    pub is_featured: bool,
    pub display_order: i64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    /// Whether the reward can currently be redeemed at all, independent
    /// of any particular customer.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        if self.status != RewardStatus::Active {
            return false;
        }
        if self.has_expiration
            && let Some(expires_at) = self.expires_at
            && now > expires_at
        {
            return false;
        }
        if self.has_stock_limit && self.redeemed_count >= self.total_stock {
            return false;
        }
        true
    }

    /// Remaining stock, `None` when unlimited.
    pub fn stock_remaining(&self) -> Option<i64> {
        self.has_stock_limit
            .then(|| (self.total_stock - self.redeemed_count).max(0))
    }
}

/// Fields required to create a reward. `total_stock: Some(n)` enables
/// the stock limit; `expires_at: Some(t)` enables expiration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReward {
    pub tenant_id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: RewardKind,
    pub points_required: i64,
    pub discount_kind: Option<DiscountKind>,
    pub discount_value: Decimal,
    pub minimum_purchase: Decimal,
    pub total_stock: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub limit_per_customer: i64,
    pub validity_days: i64,
    pub is_featured: bool,
    pub display_order: i64,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReward {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points_required: Option<i64>,
    pub discount_kind: Option<Option<DiscountKind>>,
    pub discount_value: Option<Decimal>,
    pub minimum_purchase: Option<Decimal>,
    /// `Some(Some(n))` = set/enable limit, `Some(None)` = remove limit.
    pub total_stock: Option<Option<i64>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub limit_per_customer: Option<i64>,
    pub validity_days: Option<i64>,
    pub status: Option<RewardStatus>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reward() -> Reward {
        Reward {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Free Coffee".into(),
            description: "One free coffee".into(),
            kind: RewardKind::Gift,
            points_required: 50,
            discount_kind: None,
            discount_value: Decimal::ZERO,
            minimum_purchase: Decimal::ZERO,
            has_stock_limit: false,
            total_stock: 0,
            redeemed_count: 0,
            has_expiration: false,
            expires_at: None,
            limit_per_customer: 0,
            validity_days: 30,
            status: RewardStatus::Active,
            is_featured: false,
            display_order: 0,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn inactive_reward_is_unavailable() {
        let mut r = reward();
        r.status = RewardStatus::Inactive;
        assert!(!r.is_available(Utc::now()));
    }

    #[test]
    fn expired_reward_is_unavailable() {
        let mut r = reward();
        r.has_expiration = true;
        r.expires_at = Some(Utc::now() - Duration::days(1));
        assert!(!r.is_available(Utc::now()));
    }

    #[test]
    fn exhausted_stock_is_unavailable() {
        let mut r = reward();
        r.has_stock_limit = true;
        r.total_stock = 5;
        r.redeemed_count = 5;
        assert!(!r.is_available(Utc::now()));
        assert_eq!(r.stock_remaining(), Some(0));
    }

    #[test]
    fn unlimited_reward_has_no_stock_remaining() {
        assert_eq!(reward().stock_remaining(), None);
    }
}
