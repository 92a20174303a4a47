//! Database-specific error types and conversions.

use patron_core::error::{CrmError, guard};

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate record: {entity}")]
    Duplicate { entity: String },

    /// A `THROW`n precondition inside an atomic operation; the payload
    /// is one of the [`guard`] codes.
    #[error("Guard violated: {0}")]
    Guard(String),
}

const GUARD_CODES: &[&str] = &[
    guard::INSUFFICIENT_POINTS,
    guard::REWARD_UNAVAILABLE,
    guard::REDEMPTION_LIMIT_REACHED,
    guard::REDEMPTION_NOT_REFUNDABLE,
    guard::REDEMPTION_NOT_USABLE,
];

impl DbError {
    /// Classify a failed query response: a thrown guard code becomes
    /// [`DbError::Guard`], a unique-index collision becomes
    /// [`DbError::Duplicate`], anything else is a plain query failure.
    pub(crate) fn classify(err: surrealdb::Error, entity: &str) -> Self {
        let msg = err.to_string();
        for code in GUARD_CODES {
            if msg.contains(code) {
                return DbError::Guard((*code).to_string());
            }
        }
        if msg.contains("already contains") {
            return DbError::Duplicate {
                entity: entity.to_string(),
            };
        }
        DbError::Query(msg)
    }
}

impl From<DbError> for CrmError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CrmError::NotFound { entity, id },
            DbError::Duplicate { entity } => CrmError::AlreadyExists { entity },
            DbError::Guard(code) => CrmError::Validation { message: code },
            other => CrmError::Database(other.to_string()),
        }
    }
}
