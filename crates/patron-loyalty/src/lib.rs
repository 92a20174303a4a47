//! PATRON Loyalty — the ledger, rewards/redemption and notification
//! services on top of the repository layer.

pub mod error;
pub mod ledger;
pub mod notify;
pub mod rewards;

pub use error::{LoyaltyError, LoyaltyResult, RedeemDenial};
pub use ledger::{LedgerService, RecordTransaction};
pub use notify::NotificationService;
pub use rewards::{RewardsConfig, RewardsService};
