//! Subdomain tenant resolution.
//!
//! Every tenant-scoped request carries its tenant in the hostname
//! (`simifood.patroncrm.com`). The resolver parses the subdomain and
//! attaches the matching active tenant, or a platform context when the
//! host carries no subdomain. There is no default tenant: an unknown
//! subdomain is a hard failure, never a silent fallback.

use patron_core::error::CrmError;
use patron_core::models::tenant::Tenant;
use patron_core::repository::TenantRepository;

use crate::error::ResolveError;

/// Hostname-parsing configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Production base domain (e.g. `patroncrm.com`).
    pub base_domain: String,
    /// Development base domains that also carry tenant subdomains
    /// (`foo.localhost`, `foo.127.0.0.1.nip.io`).
    pub dev_domains: Vec<String>,
    /// Request paths served without tenant resolution.
    pub bypass_prefixes: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_domain: "patroncrm.com".into(),
            dev_domains: vec!["localhost".into(), "nip.io".into()],
            bypass_prefixes: vec!["/admin/".into(), "/static/".into(), "/media/".into()],
        }
    }
}

impl ResolverConfig {
    /// Extract the tenant subdomain from a request host and path.
    ///
    /// Returns `None` for platform hosts: bypass paths, bare base or
    /// dev domains, `www`, and two-label hosts under no known base.
    pub fn subdomain_of(&self, host: &str, path: &str) -> Option<String> {
        if self.bypass_prefixes.iter().any(|p| path.starts_with(p)) {
            return None;
        }

        // Strip port, normalize case.
        let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();

        let candidate = if host == self.base_domain {
            return None;
        } else if let Some(rest) = host.strip_suffix(&format!(".{}", self.base_domain)) {
            rest.split('.').next()?.to_string()
        } else if let Some(dev) = self
            .dev_domains
            .iter()
            .find(|d| host == **d || host.ends_with(&format!(".{d}")))
        {
            if host == *dev {
                return None;
            }
            let rest = host.strip_suffix(&format!(".{dev}"))?;
            rest.split('.').next()?.to_string()
        } else {
            // Unknown base: only hosts with more than two labels carry
            // a subdomain.
            let labels: Vec<&str> = host.split('.').collect();
            if labels.len() <= 2 {
                return None;
            }
            labels[0].to_string()
        };

        if candidate.is_empty() || candidate == "www" {
            return None;
        }
        Some(candidate)
    }
}

/// Tenant context attached to a request after resolution.
#[derive(Debug, Clone)]
pub enum TenantContext {
    /// No subdomain — platform-level request (operators only).
    Platform,
    Tenant(Tenant),
}

impl TenantContext {
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            TenantContext::Platform => None,
            TenantContext::Tenant(t) => Some(t),
        }
    }
}

/// Resolves request hosts to tenant contexts against the tenant
/// directory.
pub struct TenantResolver<T: TenantRepository> {
    tenant_repo: T,
    config: ResolverConfig,
}

impl<T: TenantRepository> TenantResolver<T> {
    pub fn new(tenant_repo: T, config: ResolverConfig) -> Self {
        Self {
            tenant_repo,
            config,
        }
    }

    /// Resolve a request host/path to its tenant context.
    ///
    /// An unknown or deactivated subdomain fails with
    /// [`ResolveError::TenantNotFound`]; a tenant whose subscription
    /// blocks access fails with [`ResolveError::SubscriptionInactive`].
    pub async fn resolve(&self, host: &str, path: &str) -> Result<TenantContext, ResolveError> {
        let Some(subdomain) = self.config.subdomain_of(host, path) else {
            return Ok(TenantContext::Platform);
        };

        let tenant = match self.tenant_repo.get_by_slug(&subdomain).await {
            Ok(t) => t,
            Err(CrmError::NotFound { .. }) => {
                tracing::debug!(%subdomain, "no tenant for subdomain");
                return Err(ResolveError::TenantNotFound { subdomain });
            }
            Err(e) => return Err(ResolveError::Other(e)),
        };

        if !tenant.is_active {
            return Err(ResolveError::TenantNotFound { subdomain });
        }
        if !tenant.subscription_allows_access() {
            return Err(ResolveError::SubscriptionInactive {
                slug: tenant.slug,
                status: tenant.subscription_status,
            });
        }

        Ok(TenantContext::Tenant(tenant))
    }
}
