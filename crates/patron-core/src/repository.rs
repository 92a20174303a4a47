//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.
//!
//! The invariant-preserving mutations (ledger record, redeem,
//! cancel/reject, read toggles, fan-out materialization) are trait
//! methods rather than field writes: implementations must execute each
//! of them as one atomic unit against the store, so that aggregate
//! fields on memberships, rewards and notifications can never drift
//! from the rows they summarize.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CrmResult;
use crate::models::{
    customer::{CreateCustomer, Customer, UpdateCustomer},
    membership::{CreateMembership, Membership, UpdateMembership},
    notification::{
        CreateNotification, Notification, NotificationRecipient, NotificationTarget,
    },
    redemption::{CreateRedemption, Redemption},
    reward::{CreateReward, Reward, UpdateReward},
    session::{CreateSession, Session},
    tenant::{CreateTenant, Tenant, TenantSettings, UpdateTenant, UpdateTenantSettings},
    transaction::{CreateTransaction, Transaction},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant directory (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    /// Create a tenant together with its settings record in one atomic
    /// operation — every tenant has settings from the moment it exists.
    fn create(
        &self,
        input: CreateTenant,
    ) -> impl Future<Output = CrmResult<(Tenant, TenantSettings)>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = CrmResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = CrmResult<Tenant>> + Send;
    /// Soft-delete: sets `is_active = false`. Tenants are never hard-deleted.
    fn deactivate(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Tenant>>> + Send;

    fn get_settings(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = CrmResult<TenantSettings>> + Send;
    fn update_settings(
        &self,
        tenant_id: Uuid,
        input: UpdateTenantSettings,
    ) -> impl Future<Output = CrmResult<TenantSettings>> + Send;
}

// ---------------------------------------------------------------------------
// Identity & membership
// ---------------------------------------------------------------------------

pub trait CustomerRepository: Send + Sync {
    /// Hashes the raw password with Argon2id before storage.
    fn create(&self, input: CreateCustomer) -> impl Future<Output = CrmResult<Customer>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Customer>> + Send;
    /// Email is the global authentication key; lookup is not tenant-scoped.
    fn get_by_email(&self, email: &str) -> impl Future<Output = CrmResult<Customer>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateCustomer,
    ) -> impl Future<Output = CrmResult<Customer>> + Send;
    fn set_password(
        &self,
        id: Uuid,
        raw_password: &str,
    ) -> impl Future<Output = CrmResult<()>> + Send;
    /// Soft-delete: sets `is_active = false`.
    fn deactivate(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}

pub trait MembershipRepository: Send + Sync {
    fn create(
        &self,
        input: CreateMembership,
    ) -> impl Future<Output = CrmResult<Membership>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Membership>> + Send;
    fn get_by_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> impl Future<Output = CrmResult<Membership>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateMembership,
    ) -> impl Future<Output = CrmResult<Membership>> + Send;
    /// Removes the tenant relationship only; the underlying customer
    /// identity is untouched.
    fn remove(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Membership>>> + Send;
    /// Resolve a notification audience: active customer-role memberships
    /// filtered per the targeting rules (see [`NotificationTarget`]).
    fn list_audience(
        &self,
        tenant_id: Uuid,
        target: &NotificationTarget,
    ) -> impl Future<Output = CrmResult<Vec<Membership>>> + Send;
}

// ---------------------------------------------------------------------------
// Ledger (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

pub trait LedgerRepository: Send + Sync {
    /// Atomic ledger write: creates the transaction row and, for
    /// completed purchases/adjustments, applies the membership
    /// aggregate update in the same storage transaction. A duplicate
    /// transaction code is rejected by the unique index and surfaces as
    /// `AlreadyExists` — replays never double-count.
    fn record(
        &self,
        input: CreateTransaction,
    ) -> impl Future<Output = CrmResult<Transaction>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Transaction>> + Send;
    fn get_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> impl Future<Output = CrmResult<Transaction>> + Send;
    /// Status transition completed → refunded. Does not touch the
    /// membership's points (see `LedgerService::mark_refunded`).
    fn mark_refunded(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Transaction>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Transaction>>> + Send;
    fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Transaction>>> + Send;
}

// ---------------------------------------------------------------------------
// Rewards & redemptions (tenant-scoped)
// ---------------------------------------------------------------------------

pub trait RewardRepository: Send + Sync {
    fn create(&self, input: CreateReward) -> impl Future<Output = CrmResult<Reward>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Reward>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateReward,
    ) -> impl Future<Output = CrmResult<Reward>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Reward>>> + Send;
    fn list_active(&self, tenant_id: Uuid) -> impl Future<Output = CrmResult<Vec<Reward>>> + Send;
    /// Count of this membership's pending/approved/used redemptions of
    /// a reward, for per-customer limit checks.
    fn count_member_redemptions(
        &self,
        tenant_id: Uuid,
        reward_id: Uuid,
        membership_id: Uuid,
    ) -> impl Future<Output = CrmResult<u64>> + Send;
}

pub trait RedemptionRepository: Send + Sync {
    /// Atomic redeem: re-checks availability, stock, point sufficiency
    /// and the per-customer limit inside the transaction, then creates
    /// the redemption, debits the membership and increments the
    /// reward's redeemed count (flipping it to out-of-stock at the
    /// cap). Guard failures surface as `Validation` errors carrying a
    /// [`crate::error::guard`] code.
    fn redeem(
        &self,
        input: CreateRedemption,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    fn get_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    /// Terminal cancel; when `refund_points` is set, the point
    /// re-credit and the stock decrement (floored at zero) happen in
    /// the same transaction — both effects or neither.
    fn cancel(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        refund_points: bool,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    /// Terminal reject with a required reason; refund semantics as
    /// [`RedemptionRepository::cancel`].
    fn reject(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: &str,
        refund_points: bool,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    /// Marks a pending/approved redemption used, recording the staff
    /// actor and the optional purchase transaction it was applied to.
    fn mark_used(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        staff_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> impl Future<Output = CrmResult<Redemption>> + Send;
    /// Sweep pending/approved redemptions whose validity window has
    /// elapsed into `Expired` (no refund). Returns the number swept.
    fn expire_due(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = CrmResult<u64>> + Send;
    fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Redemption>>> + Send;
}

// ---------------------------------------------------------------------------
// Notifications (tenant-scoped)
// ---------------------------------------------------------------------------

pub trait NotificationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateNotification,
    ) -> impl Future<Output = CrmResult<Notification>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Notification>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<Notification>>> + Send;
    /// Scheduled notifications due at `now`, for the external periodic
    /// send job.
    fn list_due_scheduled(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = CrmResult<Vec<Notification>>> + Send;

    fn mark_sending(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<()>> + Send;
    /// Materialize recipient rows for the given memberships with
    /// get-or-create semantics (resends do not duplicate), returning
    /// the total number of recipient rows for the notification.
    fn add_recipients(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        membership_ids: &[Uuid],
    ) -> impl Future<Output = CrmResult<u64>> + Send;
    /// Record the outcome of a send: recipient/delivered counters from
    /// the actual recipient count, status sent, `sent_at = now`.
    fn finalize_send(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        recipients: u64,
    ) -> impl Future<Output = CrmResult<Notification>> + Send;
    fn mark_failed(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CrmResult<Notification>> + Send;

    fn list_recipients(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<NotificationRecipient>>> + Send;
    fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CrmResult<PaginatedResult<NotificationRecipient>>> + Send;
    fn unread_count(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
    ) -> impl Future<Output = CrmResult<u64>> + Send;

    /// Flip the recipient's read flag and adjust the parent's
    /// `total_read` in one atomic unit. Returns `false` when the flag
    /// was already in the requested state (no counter change).
    fn mark_read(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = CrmResult<bool>> + Send;
    fn mark_unread(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = CrmResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions (global scope; tenant binding lives on the row)
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = CrmResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = CrmResult<Session>> + Send;
    /// Invalidate a single session (logout).
    fn invalidate(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
    /// Invalidate all sessions for a customer (e.g. on password change).
    fn invalidate_customer_sessions(
        &self,
        customer_id: Uuid,
    ) -> impl Future<Output = CrmResult<()>> + Send;
    /// Remove all expired sessions.
    fn cleanup_expired(&self) -> impl Future<Output = CrmResult<u64>> + Send;
}
