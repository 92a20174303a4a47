//! PATRON Auth — subdomain tenant resolution, tenant-aware password
//! authentication and session/JWT issuance.

pub mod config;
pub mod error;
pub mod password;
pub mod resolver;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, ResolveError};
pub use resolver::{ResolverConfig, TenantContext, TenantResolver};
pub use service::{AuthService, LoginInput, LoginOutput};
pub use token::AccessTokenClaims;
