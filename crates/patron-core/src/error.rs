//! Error types for the PATRON system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Tenant context missing or invalid")]
    TenantContext,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CrmResult<T> = Result<T, CrmError>;

/// Guard codes thrown by the storage layer when an atomic operation's
/// in-transaction precondition fails (e.g. a concurrent redemption won
/// the race for the last stock unit).
///
/// The db layer surfaces them as [`CrmError::Validation`] with the code
/// as the message; service layers match on these constants to produce
/// typed denial reasons instead of leaking raw storage errors.
pub mod guard {
    pub const INSUFFICIENT_POINTS: &str = "insufficient_points";
    pub const REWARD_UNAVAILABLE: &str = "reward_unavailable";
    pub const REDEMPTION_LIMIT_REACHED: &str = "redemption_limit_reached";
    pub const REDEMPTION_NOT_REFUNDABLE: &str = "redemption_not_refundable";
    pub const REDEMPTION_NOT_USABLE: &str = "redemption_not_usable";
}
