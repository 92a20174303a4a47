//! PATRON storage layer — SurrealDB connection management, schema
//! migrations and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - SurrealDB implementations of the `patron-core` repository traits
//!
//! The invariant-carrying mutations (ledger writes, redemptions, read
//! counters, fan-out) run as multi-statement SurrealQL transactions;
//! failed in-transaction preconditions `THROW` a guard code that this
//! crate translates back into typed errors.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
