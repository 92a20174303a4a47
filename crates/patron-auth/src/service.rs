//! Tenant-aware authentication service — login, logout and session
//! validation.

use chrono::{Duration, Utc};
use patron_core::error::{CrmError, CrmResult};
use patron_core::models::customer::Customer;
use patron_core::models::membership::{Membership, MembershipRole};
use patron_core::models::session::{CreateSession, Session};
use patron_core::models::tenant::Tenant;
use patron_core::repository::{CustomerRepository, MembershipRepository, SessionRepository};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

fn role_str(role: MembershipRole) -> &'static str {
    match role {
        MembershipRole::Owner => "Owner",
        MembershipRole::Admin => "Admin",
        MembershipRole::Manager => "Manager",
        MembershipRole::Staff => "Staff",
        MembershipRole::Customer => "Customer",
    }
}

/// Input for the login flow.
///
/// `tenant` is the resolver's output: `Some` for subdomain requests,
/// `None` for platform-level logins (superusers only).
#[derive(Debug)]
pub struct LoginInput {
    pub tenant: Option<Tenant>,
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque session token (return to client, not stored).
    pub session_token: String,
    /// Session ID (can be used for logout).
    pub session_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// The tenant membership the login was scoped to; `None` for
    /// platform logins.
    pub membership: Option<Membership>,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer has
/// no dependency on the database crate.
pub struct AuthService<C: CustomerRepository, M: MembershipRepository, S: SessionRepository> {
    customer_repo: C,
    membership_repo: M,
    session_repo: S,
    config: AuthConfig,
}

impl<C: CustomerRepository, M: MembershipRepository, S: SessionRepository>
    AuthService<C, M, S>
{
    pub fn new(customer_repo: C, membership_repo: M, session_repo: S, config: AuthConfig) -> Self {
        Self {
            customer_repo,
            membership_repo,
            session_repo,
            config,
        }
    }

    /// Authenticate a customer with email + password under the resolved
    /// tenant context and issue tokens.
    ///
    /// Valid credentials are not enough on a tenant subdomain: the
    /// customer must hold an active membership with that tenant, so the
    /// same account can be a customer of one business and a stranger to
    /// the next.
    pub async fn login(&self, input: LoginInput) -> CrmResult<LoginOutput> {
        // 1. Look up the global identity by email. A miss still burns
        //    one Argon2id verification so that response timing does not
        //    reveal which emails are registered.
        let customer = match self.customer_repo.get_by_email(&input.email).await {
            Ok(c) => c,
            Err(CrmError::NotFound { .. }) => {
                password::verify_dummy(&input.password, self.config.pepper.as_deref());
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        // 2. Verify password.
        let valid = password::verify_password(
            &input.password,
            &customer.password_hash,
            self.config.pepper.as_deref(),
        )
        .map_err(|e| CrmError::Crypto(e.to_string()))?;

        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        // 3. Check the global account switch.
        if !customer.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        // 4. Check the tenant relationship.
        let (membership, role) = match &input.tenant {
            Some(tenant) => {
                let membership = match self
                    .membership_repo
                    .get_by_customer(tenant.id, customer.id)
                    .await
                {
                    Ok(m) => m,
                    Err(CrmError::NotFound { .. }) => {
                        return Err(AuthError::NoTenantMembership.into());
                    }
                    Err(e) => return Err(e),
                };
                if !membership.is_active {
                    return Err(AuthError::NoTenantMembership.into());
                }
                let role = role_str(membership.role);
                (Some(membership), role)
            }
            None => {
                if !customer.is_superuser {
                    return Err(AuthError::PlatformAccessDenied.into());
                }
                (None, "Superuser")
            }
        };

        // 5. Generate the opaque session token and create the session
        //    bound to (customer, tenant).
        let raw_token = token::generate_session_token();
        let token_hash = token::hash_session_token(&raw_token);
        let expires_at = Utc::now() + Duration::seconds(self.config.session_lifetime_secs as i64);

        let tenant_id = input.tenant.as_ref().map(|t| t.id);
        let session = self
            .session_repo
            .create(CreateSession {
                customer_id: customer.id,
                tenant_id,
                token_hash,
                ip_address: input.ip_address,
                user_agent: input.user_agent,
                expires_at,
            })
            .await?;

        // 6. Issue the JWT access token.
        let access_token =
            token::issue_access_token(customer.id, tenant_id, role, &self.config)
                .map_err(CrmError::from)?;

        tracing::info!(
            customer_id = %customer.id,
            tenant_id = ?tenant_id,
            "login succeeded"
        );

        Ok(LoginOutput {
            access_token,
            session_token: raw_token,
            session_id: session.id,
            expires_in: self.config.access_token_lifetime_secs,
            membership,
        })
    }

    /// Validate an opaque session token under the resolved tenant
    /// context.
    ///
    /// A session is only valid for the tenant it was created under;
    /// presenting it on another subdomain (or at platform level) fails
    /// even before the expiry check passes.
    pub async fn authenticate_session(
        &self,
        tenant: Option<&Tenant>,
        raw_token: &str,
    ) -> CrmResult<(Session, Customer)> {
        let token_hash = token::hash_session_token(raw_token);
        let session = match self.session_repo.get_by_token_hash(&token_hash).await {
            Ok(s) => s,
            Err(CrmError::NotFound { .. }) => return Err(AuthError::SessionInvalid.into()),
            Err(e) => return Err(e),
        };

        if session.expires_at <= Utc::now() {
            let _ = self.session_repo.invalidate(session.id).await;
            return Err(AuthError::SessionExpired.into());
        }

        if session.tenant_id != tenant.map(|t| t.id) {
            return Err(AuthError::SessionInvalid.into());
        }

        let customer = self.customer_repo.get_by_id(session.customer_id).await?;
        if !customer.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        Ok((session, customer))
    }

    /// Invalidate a single session (logout).
    pub async fn logout(&self, session_id: Uuid) -> CrmResult<()> {
        self.session_repo.invalidate(session_id).await
    }

    /// Revoke all sessions for a customer (e.g. on password change).
    pub async fn revoke_all_sessions(&self, customer_id: Uuid) -> CrmResult<()> {
        self.session_repo
            .invalidate_customer_sessions(customer_id)
            .await
    }
}
