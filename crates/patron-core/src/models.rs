//! Domain models for PATRON.
//!
//! These are the core types shared across all crates. Every tenant-scoped
//! entity carries its `tenant_id` so the storage layer can enforce
//! isolation on each query.

pub mod customer;
pub mod membership;
pub mod notification;
pub mod redemption;
pub mod reward;
pub mod session;
pub mod tenant;
pub mod transaction;
