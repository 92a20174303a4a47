//! Redemption domain model — one membership's claim on a reward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Redemption lifecycle.
///
/// `Pending → Approved → Used` is the happy path; `Cancelled` and
/// `Rejected` are terminal and (optionally) refund the spent points.
/// `Expired` is reached by validity-window elapse, not by an explicit
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Used,
    Expired,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub id: Uuid,
    /// Unique human-quotable code (`RWD-` + 6 alphanumerics); staff use
    /// it to look a redemption up at the counter.
    pub code: String,
    pub tenant_id: Uuid,
    pub reward_id: Uuid,
    pub membership_id: Uuid,
    pub points_spent: i64,
    pub status: RedemptionStatus,
    pub valid_from: DateTime<Utc>,
    /// `None` = never expires.
    pub valid_until: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    /// Staff member who processed the use.
    pub used_by: Option<Uuid>,
    /// Purchase transaction this redemption was applied to, if any.
    pub transaction_id: Option<Uuid>,
    pub rejection_reason: String,
    pub redeemed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redemption {
    /// Whether the redemption can still be used: pending or approved,
    /// and `now` inside the validity window.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if !matches!(
            self.status,
            RedemptionStatus::Pending | RedemptionStatus::Approved
        ) {
            return false;
        }
        if now < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => now <= until,
            None => true,
        }
    }

    pub fn is_window_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| now > until)
    }
}

/// Input for the atomic redeem operation. Built by `RewardsService`
/// after the eligibility checks pass; the repository re-checks every
/// guard inside the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRedemption {
    pub code: String,
    pub tenant_id: Uuid,
    pub reward_id: Uuid,
    pub membership_id: Uuid,
    pub points_spent: i64,
    /// Initial status: `Approved` in the customer-facing auto-approve
    /// flow, `Pending` when a review workflow is configured.
    pub status: RedemptionStatus,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Per-customer redemption cap carried from the reward, 0 = none.
    pub limit_per_customer: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn redemption(status: RedemptionStatus) -> Redemption {
        let now = Utc::now();
        Redemption {
            id: Uuid::new_v4(),
            code: "RWD-ABC123".into(),
            tenant_id: Uuid::new_v4(),
            reward_id: Uuid::new_v4(),
            membership_id: Uuid::new_v4(),
            points_spent: 50,
            status,
            valid_from: now - Duration::hours(1),
            valid_until: Some(now + Duration::days(30)),
            used_at: None,
            used_by: None,
            transaction_id: None,
            rejection_reason: String::new(),
            redeemed_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_and_approved_within_window_are_valid() {
        assert!(redemption(RedemptionStatus::Pending).is_valid(Utc::now()));
        assert!(redemption(RedemptionStatus::Approved).is_valid(Utc::now()));
    }

    #[test]
    fn terminal_states_are_never_valid() {
        for status in [
            RedemptionStatus::Used,
            RedemptionStatus::Expired,
            RedemptionStatus::Cancelled,
            RedemptionStatus::Rejected,
        ] {
            assert!(!redemption(status).is_valid(Utc::now()));
        }
    }

    #[test]
    fn elapsed_window_invalidates() {
        let mut r = redemption(RedemptionStatus::Approved);
        r.valid_until = Some(Utc::now() - Duration::hours(1));
        assert!(!r.is_valid(Utc::now()));
        assert!(r.is_window_expired(Utc::now()));
    }

    #[test]
    fn future_valid_from_invalidates() {
        let mut r = redemption(RedemptionStatus::Approved);
        r.valid_from = Utc::now() + Duration::hours(1);
        assert!(!r.is_valid(Utc::now()));
    }
}
