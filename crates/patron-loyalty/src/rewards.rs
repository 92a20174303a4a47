//! Rewards service — redemption eligibility, claiming and the
//! redemption state machine.

use chrono::{Duration, Utc};
use patron_core::error::{CrmError, guard};
use patron_core::models::membership::Membership;
use patron_core::models::redemption::{CreateRedemption, Redemption, RedemptionStatus};
use patron_core::models::reward::RewardStatus;
use patron_core::repository::{RedemptionRepository, RewardRepository};
use rand::Rng;
use uuid::Uuid;

use crate::error::{LoyaltyError, LoyaltyResult, RedeemDenial};

const RWD_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RWD_CODE_LEN: usize = 6;

/// Attempts at a fresh code before giving up on unique-index
/// collisions.
const CODE_RETRY_LIMIT: usize = 5;

/// Generate a `RWD-` redemption code (6 chars from [A-Z0-9]).
pub fn generate_redemption_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..RWD_CODE_LEN)
        .map(|_| RWD_CODE_CHARSET[rng.random_range(0..RWD_CODE_CHARSET.len())] as char)
        .collect();
    format!("RWD-{suffix}")
}

#[derive(Debug, Clone)]
pub struct RewardsConfig {
    /// Whether redemptions skip staff review and start out approved.
    pub auto_approve: bool,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self { auto_approve: true }
    }
}

/// Rewards and redemption service.
pub struct RewardsService<R: RewardRepository, D: RedemptionRepository> {
    reward_repo: R,
    redemption_repo: D,
    config: RewardsConfig,
}

impl<R: RewardRepository, D: RedemptionRepository> RewardsService<R, D> {
    pub fn new(reward_repo: R, redemption_repo: D, config: RewardsConfig) -> Self {
        Self {
            reward_repo,
            redemption_repo,
            config,
        }
    }

    /// Claim a reward for a membership.
    ///
    /// Eligibility is checked twice: once here for a friendly denial
    /// reason, then again inside the atomic redeem transaction, which
    /// is what actually protects the balance and the stock under
    /// concurrency. A denial from the transaction is mapped back to the
    /// same [`RedeemDenial`] reasons.
    pub async fn redeem(
        &self,
        membership: &Membership,
        reward_id: Uuid,
    ) -> LoyaltyResult<Redemption> {
        let reward = self
            .reward_repo
            .get_by_id(membership.tenant_id, reward_id)
            .await?;
        let now = Utc::now();

        if reward.status != RewardStatus::Active || !reward.is_available(now) {
            return Err(LoyaltyError::RedeemDenied {
                reason: RedeemDenial::RewardUnavailable,
            });
        }
        if membership.loyalty_points < reward.points_required {
            return Err(LoyaltyError::RedeemDenied {
                reason: RedeemDenial::InsufficientPoints {
                    shortfall: reward.points_required - membership.loyalty_points,
                },
            });
        }
        if reward.limit_per_customer > 0 {
            let used = self
                .reward_repo
                .count_member_redemptions(membership.tenant_id, reward_id, membership.id)
                .await?;
            if used >= reward.limit_per_customer as u64 {
                return Err(LoyaltyError::RedeemDenied {
                    reason: RedeemDenial::LimitReached,
                });
            }
        }

        let status = if self.config.auto_approve {
            RedemptionStatus::Approved
        } else {
            RedemptionStatus::Pending
        };
        let valid_until =
            (reward.validity_days > 0).then(|| now + Duration::days(reward.validity_days));
        let shortfall = (reward.points_required - membership.loyalty_points).max(0);

        // Retry on the (unlikely) code collision; every other error is
        // final.
        for _ in 0..CODE_RETRY_LIMIT {
            let result = self
                .redemption_repo
                .redeem(CreateRedemption {
                    code: generate_redemption_code(),
                    tenant_id: membership.tenant_id,
                    reward_id,
                    membership_id: membership.id,
                    points_spent: reward.points_required,
                    status,
                    valid_from: now,
                    valid_until,
                    limit_per_customer: reward.limit_per_customer,
                })
                .await;

            match result {
                Ok(redemption) => {
                    tracing::info!(
                        tenant_id = %membership.tenant_id,
                        membership_id = %membership.id,
                        reward_id = %reward_id,
                        code = %redemption.code,
                        "reward redeemed"
                    );
                    return Ok(redemption);
                }
                Err(CrmError::AlreadyExists { .. }) => continue,
                Err(e) => return Err(denial_from(e, shortfall)),
            }
        }
        Err(LoyaltyError::Other(CrmError::Internal(
            "could not allocate a unique redemption code".into(),
        )))
    }

    /// Cancel a pending/approved redemption, optionally refunding the
    /// points and the stock unit in the same atomic operation.
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        redemption_id: Uuid,
        refund_points: bool,
    ) -> LoyaltyResult<Redemption> {
        self.redemption_repo
            .cancel(tenant_id, redemption_id, refund_points)
            .await
            .map_err(state_error)
    }

    /// Reject a pending/approved redemption with a reason; refund
    /// semantics as [`RewardsService::cancel`].
    pub async fn reject(
        &self,
        tenant_id: Uuid,
        redemption_id: Uuid,
        reason: &str,
        refund_points: bool,
    ) -> LoyaltyResult<Redemption> {
        self.redemption_repo
            .reject(tenant_id, redemption_id, reason, refund_points)
            .await
            .map_err(state_error)
    }

    /// Mark a redemption as used at the counter.
    pub async fn use_redemption(
        &self,
        tenant_id: Uuid,
        redemption_id: Uuid,
        staff_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> LoyaltyResult<Redemption> {
        self.redemption_repo
            .mark_used(tenant_id, redemption_id, staff_id, transaction_id)
            .await
            .map_err(state_error)
    }

    /// Sweep pending/approved redemptions whose validity window has
    /// elapsed. Returns the number expired.
    pub async fn expire_due(&self, tenant_id: Uuid) -> LoyaltyResult<u64> {
        let swept = self
            .redemption_repo
            .expire_due(tenant_id, Utc::now())
            .await?;
        if swept > 0 {
            tracing::info!(%tenant_id, swept, "expired redemptions swept");
        }
        Ok(swept)
    }
}

/// Map a guard code thrown by the atomic redeem transaction to the
/// matching denial.
fn denial_from(err: CrmError, shortfall: i64) -> LoyaltyError {
    match &err {
        CrmError::Validation { message } => match message.as_str() {
            guard::REWARD_UNAVAILABLE => LoyaltyError::RedeemDenied {
                reason: RedeemDenial::RewardUnavailable,
            },
            guard::INSUFFICIENT_POINTS => LoyaltyError::RedeemDenied {
                reason: RedeemDenial::InsufficientPoints { shortfall },
            },
            guard::REDEMPTION_LIMIT_REACHED => LoyaltyError::RedeemDenied {
                reason: RedeemDenial::LimitReached,
            },
            _ => LoyaltyError::Other(err),
        },
        _ => LoyaltyError::Other(err),
    }
}

/// Map state-machine guard codes from cancel/reject/use to
/// `InvalidState`.
fn state_error(err: CrmError) -> LoyaltyError {
    match &err {
        CrmError::Validation { message } => match message.as_str() {
            guard::REDEMPTION_NOT_REFUNDABLE => LoyaltyError::InvalidState(
                "only pending or approved redemptions can be cancelled or rejected".into(),
            ),
            guard::REDEMPTION_NOT_USABLE => LoyaltyError::InvalidState(
                "redemption is not usable (wrong state or outside its validity window)".into(),
            ),
            _ => LoyaltyError::Other(err),
        },
        _ => LoyaltyError::Other(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redemption_codes_have_the_expected_shape() {
        let code = generate_redemption_code();
        assert!(code.starts_with("RWD-"));
        assert_eq!(code.len(), 4 + RWD_CODE_LEN);
        assert!(
            code[4..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn auto_approve_is_the_default_policy() {
        assert!(RewardsConfig::default().auto_approve);
    }
}
