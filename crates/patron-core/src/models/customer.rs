//! Customer domain model.
//!
//! A customer is a platform-global identity keyed by email. The same
//! person can hold memberships in any number of tenants; deleting a
//! membership never deletes the customer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    /// Globally unique; doubles as the login username.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password_hash: String,
    /// Global switch: an inactive customer cannot authenticate anywhere,
    /// regardless of per-tenant membership state.
    pub is_active: bool,
    /// Platform operators; the only identities that may authenticate
    /// without a tenant context.
    pub is_superuser: bool,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}
