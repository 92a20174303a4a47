//! SurrealDB implementation of [`SessionRepository`].
//!
//! Sessions are looked up by token hash only; the caller hashes the
//! opaque token before calling in, so raw tokens never reach storage.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::session::{CreateSession, Session};
use patron_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{parse_opt_uuid, parse_uuid};

const SESSION_FIELDS: &str = "\
    meta::id(id) AS record_id, customer_id, tenant_id, token_hash, \
    ip_address, user_agent, expires_at, created_at";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    customer_id: String,
    tenant_id: Option<String>,
    token_hash: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            id: parse_uuid("session", &self.record_id)?,
            customer_id: parse_uuid("customer", &self.customer_id)?,
            tenant_id: parse_opt_uuid("tenant", self.tenant_id)?,
            token_hash: self.token_hash,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}

/// SurrealDB implementation of the session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> CrmResult<Session> {
        let id = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 customer_id = $customer_id, tenant_id = $tenant_id, \
                 token_hash = $token_hash, ip_address = $ip_address, \
                 user_agent = $user_agent, expires_at = $expires_at \
                 RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("customer_id", input.customer_id.to_string()))
            .bind(("tenant_id", input.tenant_id.map(|t| t.to_string())))
            .bind(("token_hash", input.token_hash))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "session"))?;

        let query = format!("SELECT {SESSION_FIELDS} FROM type::record('session', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id,
        })?;
        Ok(row.try_into_session()?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> CrmResult<Session> {
        let query = format!(
            "SELECT {SESSION_FIELDS} FROM session \
             WHERE token_hash = $token_hash"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: "token".into(),
        })?;
        Ok(row.try_into_session()?)
    }

    async fn invalidate(&self, id: Uuid) -> CrmResult<()> {
        self.db
            .query("DELETE type::record('session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn invalidate_customer_sessions(&self, customer_id: Uuid) -> CrmResult<()> {
        self.db
            .query("DELETE session WHERE customer_id = $customer_id")
            .bind(("customer_id", customer_id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> CrmResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE session WHERE expires_at < time::now() \
                 RETURN meta::id(id) AS record_id",
            )
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
