//! SurrealDB repository implementations.

mod convert;
mod customer;
mod ledger;
mod membership;
mod notification;
mod redemption;
mod reward;
mod session;
mod tenant;

pub use customer::{SurrealCustomerRepository, hash_password, verify_password};
pub use ledger::SurrealLedgerRepository;
pub use membership::SurrealMembershipRepository;
pub use notification::SurrealNotificationRepository;
pub use redemption::SurrealRedemptionRepository;
pub use reward::SurrealRewardRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
