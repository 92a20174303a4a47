//! Loyalty service error types.

use patron_core::error::CrmError;
use thiserror::Error;

pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

/// Why a redeem request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemDenial {
    /// Inactive, expired or out of stock.
    RewardUnavailable,
    InsufficientPoints { shortfall: i64 },
    /// Per-customer redemption cap reached.
    LimitReached,
}

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("duplicate transaction code: {code}")]
    DuplicateTransaction { code: String },

    #[error("redemption denied: {reason:?}")]
    RedeemDenied { reason: RedeemDenial },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("transaction is not refundable")]
    NotRefundable,

    #[error(transparent)]
    Other(#[from] CrmError),
}

impl From<LoyaltyError> for CrmError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::Other(inner) => inner,
            LoyaltyError::DuplicateTransaction { code } => CrmError::AlreadyExists {
                entity: format!("transaction {code}"),
            },
            other => CrmError::Validation {
                message: other.to_string(),
            },
        }
    }
}
