//! Session domain model.
//!
//! A session is bound to both the customer and the tenant it was
//! created under; tenant-scoped requests re-check that binding against
//! the resolver's tenant, so a session is never valid on another
//! subdomain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// `None` for platform-admin sessions (superusers only).
    pub tenant_id: Option<Uuid>,
    /// SHA-256 of the opaque session token; the raw token is only ever
    /// returned to the client.
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub customer_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}
