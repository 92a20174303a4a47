//! Authentication and tenant-resolution error types.

use patron_core::error::CrmError;
use patron_core::models::tenant::SubscriptionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("no membership with this business")]
    NoTenantMembership,

    #[error("platform access is restricted to operators")]
    PlatformAccessDenied,

    #[error("session has expired")]
    SessionExpired,

    #[error("invalid session")]
    SessionInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CrmError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::PlatformAccessDenied => CrmError::AccessDenied {
                reason: err.to_string(),
            },
            AuthError::Crypto(msg) => CrmError::Crypto(msg),
            other => CrmError::AuthenticationFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Failure to attach a tenant context to a request host.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The subdomain names no active tenant (404-equivalent).
    #[error("no business found for subdomain '{subdomain}'")]
    TenantNotFound { subdomain: String },

    /// The tenant exists but its subscription blocks access
    /// (402-equivalent).
    #[error("subscription for '{slug}' is {status:?}")]
    SubscriptionInactive {
        slug: String,
        status: SubscriptionStatus,
    },

    #[error(transparent)]
    Other(#[from] CrmError),
}

impl From<ResolveError> for CrmError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::TenantNotFound { subdomain } => CrmError::NotFound {
                entity: "tenant".into(),
                id: subdomain,
            },
            ResolveError::SubscriptionInactive { .. } => CrmError::AccessDenied {
                reason: err.to_string(),
            },
            ResolveError::Other(inner) => inner,
        }
    }
}
