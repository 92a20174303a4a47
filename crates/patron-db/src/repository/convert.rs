//! String conversions between DB enum columns and domain enums.
//!
//! Enums are stored as plain strings validated by ASSERT constraints in
//! the schema; these helpers keep the two representations in one place.

use patron_core::models::membership::MembershipRole;
use patron_core::models::notification::{
    DeliveryStatus, NotificationCategory, NotificationPriority, NotificationStatus,
};
use patron_core::models::redemption::RedemptionStatus;
use patron_core::models::reward::{DiscountKind, RewardKind, RewardStatus};
use patron_core::models::tenant::{CurrencyPosition, SubscriptionStatus};
use patron_core::models::transaction::{PaymentMethod, TransactionKind, TransactionStatus};
use uuid::Uuid;

use crate::error::DbError;

fn unknown(what: &str, value: &str) -> DbError {
    DbError::Query(format!("unknown {what}: {value}"))
}

pub(crate) fn parse_uuid(what: &str, s: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Query(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(what: &str, s: Option<String>) -> Result<Option<Uuid>, DbError> {
    s.map(|s| parse_uuid(what, &s)).transpose()
}

pub(crate) fn subscription_status_to_str(s: SubscriptionStatus) -> &'static str {
    match s {
        SubscriptionStatus::Trial => "Trial",
        SubscriptionStatus::Active => "Active",
        SubscriptionStatus::PastDue => "PastDue",
        SubscriptionStatus::Suspended => "Suspended",
        SubscriptionStatus::Cancelled => "Cancelled",
    }
}

pub(crate) fn parse_subscription_status(s: &str) -> Result<SubscriptionStatus, DbError> {
    match s {
        "Trial" => Ok(SubscriptionStatus::Trial),
        "Active" => Ok(SubscriptionStatus::Active),
        "PastDue" => Ok(SubscriptionStatus::PastDue),
        "Suspended" => Ok(SubscriptionStatus::Suspended),
        "Cancelled" => Ok(SubscriptionStatus::Cancelled),
        other => Err(unknown("subscription status", other)),
    }
}

pub(crate) fn currency_position_to_str(p: CurrencyPosition) -> &'static str {
    match p {
        CurrencyPosition::Before => "Before",
        CurrencyPosition::After => "After",
    }
}

pub(crate) fn parse_currency_position(s: &str) -> Result<CurrencyPosition, DbError> {
    match s {
        "Before" => Ok(CurrencyPosition::Before),
        "After" => Ok(CurrencyPosition::After),
        other => Err(unknown("currency position", other)),
    }
}

pub(crate) fn role_to_str(r: MembershipRole) -> &'static str {
    match r {
        MembershipRole::Owner => "Owner",
        MembershipRole::Admin => "Admin",
        MembershipRole::Manager => "Manager",
        MembershipRole::Staff => "Staff",
        MembershipRole::Customer => "Customer",
    }
}

pub(crate) fn parse_role(s: &str) -> Result<MembershipRole, DbError> {
    match s {
        "Owner" => Ok(MembershipRole::Owner),
        "Admin" => Ok(MembershipRole::Admin),
        "Manager" => Ok(MembershipRole::Manager),
        "Staff" => Ok(MembershipRole::Staff),
        "Customer" => Ok(MembershipRole::Customer),
        other => Err(unknown("membership role", other)),
    }
}

pub(crate) fn transaction_kind_to_str(k: TransactionKind) -> &'static str {
    match k {
        TransactionKind::Purchase => "Purchase",
        TransactionKind::Refund => "Refund",
        TransactionKind::Adjustment => "Adjustment",
    }
}

pub(crate) fn parse_transaction_kind(s: &str) -> Result<TransactionKind, DbError> {
    match s {
        "Purchase" => Ok(TransactionKind::Purchase),
        "Refund" => Ok(TransactionKind::Refund),
        "Adjustment" => Ok(TransactionKind::Adjustment),
        other => Err(unknown("transaction kind", other)),
    }
}

pub(crate) fn transaction_status_to_str(s: TransactionStatus) -> &'static str {
    match s {
        TransactionStatus::Completed => "Completed",
        TransactionStatus::Pending => "Pending",
        TransactionStatus::Cancelled => "Cancelled",
        TransactionStatus::Refunded => "Refunded",
    }
}

pub(crate) fn parse_transaction_status(s: &str) -> Result<TransactionStatus, DbError> {
    match s {
        "Completed" => Ok(TransactionStatus::Completed),
        "Pending" => Ok(TransactionStatus::Pending),
        "Cancelled" => Ok(TransactionStatus::Cancelled),
        "Refunded" => Ok(TransactionStatus::Refunded),
        other => Err(unknown("transaction status", other)),
    }
}

pub(crate) fn payment_method_to_str(m: PaymentMethod) -> &'static str {
    match m {
        PaymentMethod::Cash => "Cash",
        PaymentMethod::Card => "Card",
        PaymentMethod::Mobile => "Mobile",
        PaymentMethod::Other => "Other",
    }
}

pub(crate) fn parse_payment_method(s: &str) -> Result<PaymentMethod, DbError> {
    match s {
        "Cash" => Ok(PaymentMethod::Cash),
        "Card" => Ok(PaymentMethod::Card),
        "Mobile" => Ok(PaymentMethod::Mobile),
        "Other" => Ok(PaymentMethod::Other),
        other => Err(unknown("payment method", other)),
    }
}

pub(crate) fn reward_kind_to_str(k: RewardKind) -> &'static str {
    match k {
        RewardKind::Discount => "Discount",
        RewardKind::Product => "Product",
        RewardKind::Gift => "Gift",
        RewardKind::Upgrade => "Upgrade",
    }
}

pub(crate) fn parse_reward_kind(s: &str) -> Result<RewardKind, DbError> {
    match s {
        "Discount" => Ok(RewardKind::Discount),
        "Product" => Ok(RewardKind::Product),
        "Gift" => Ok(RewardKind::Gift),
        "Upgrade" => Ok(RewardKind::Upgrade),
        other => Err(unknown("reward kind", other)),
    }
}

pub(crate) fn discount_kind_to_str(k: DiscountKind) -> &'static str {
    match k {
        DiscountKind::Percentage => "Percentage",
        DiscountKind::Fixed => "Fixed",
    }
}

pub(crate) fn parse_discount_kind(s: &str) -> Result<DiscountKind, DbError> {
    match s {
        "Percentage" => Ok(DiscountKind::Percentage),
        "Fixed" => Ok(DiscountKind::Fixed),
        other => Err(unknown("discount kind", other)),
    }
}

pub(crate) fn reward_status_to_str(s: RewardStatus) -> &'static str {
    match s {
        RewardStatus::Active => "Active",
        RewardStatus::Inactive => "Inactive",
        RewardStatus::Expired => "Expired",
        RewardStatus::OutOfStock => "OutOfStock",
    }
}

pub(crate) fn parse_reward_status(s: &str) -> Result<RewardStatus, DbError> {
    match s {
        "Active" => Ok(RewardStatus::Active),
        "Inactive" => Ok(RewardStatus::Inactive),
        "Expired" => Ok(RewardStatus::Expired),
        "OutOfStock" => Ok(RewardStatus::OutOfStock),
        other => Err(unknown("reward status", other)),
    }
}

pub(crate) fn redemption_status_to_str(s: RedemptionStatus) -> &'static str {
    match s {
        RedemptionStatus::Pending => "Pending",
        RedemptionStatus::Approved => "Approved",
        RedemptionStatus::Used => "Used",
        RedemptionStatus::Expired => "Expired",
        RedemptionStatus::Cancelled => "Cancelled",
        RedemptionStatus::Rejected => "Rejected",
    }
}

pub(crate) fn parse_redemption_status(s: &str) -> Result<RedemptionStatus, DbError> {
    match s {
        "Pending" => Ok(RedemptionStatus::Pending),
        "Approved" => Ok(RedemptionStatus::Approved),
        "Used" => Ok(RedemptionStatus::Used),
        "Expired" => Ok(RedemptionStatus::Expired),
        "Cancelled" => Ok(RedemptionStatus::Cancelled),
        "Rejected" => Ok(RedemptionStatus::Rejected),
        other => Err(unknown("redemption status", other)),
    }
}

pub(crate) fn notification_category_to_str(c: NotificationCategory) -> &'static str {
    match c {
        NotificationCategory::Promotion => "Promotion",
        NotificationCategory::Announcement => "Announcement",
        NotificationCategory::Birthday => "Birthday",
        NotificationCategory::Reminder => "Reminder",
        NotificationCategory::Alert => "Alert",
        NotificationCategory::Update => "Update",
        NotificationCategory::Other => "Other",
    }
}

pub(crate) fn parse_notification_category(s: &str) -> Result<NotificationCategory, DbError> {
    match s {
        "Promotion" => Ok(NotificationCategory::Promotion),
        "Announcement" => Ok(NotificationCategory::Announcement),
        "Birthday" => Ok(NotificationCategory::Birthday),
        "Reminder" => Ok(NotificationCategory::Reminder),
        "Alert" => Ok(NotificationCategory::Alert),
        "Update" => Ok(NotificationCategory::Update),
        "Other" => Ok(NotificationCategory::Other),
        other => Err(unknown("notification category", other)),
    }
}

pub(crate) fn notification_priority_to_str(p: NotificationPriority) -> &'static str {
    match p {
        NotificationPriority::Low => "Low",
        NotificationPriority::Normal => "Normal",
        NotificationPriority::High => "High",
        NotificationPriority::Urgent => "Urgent",
    }
}

pub(crate) fn parse_notification_priority(s: &str) -> Result<NotificationPriority, DbError> {
    match s {
        "Low" => Ok(NotificationPriority::Low),
        "Normal" => Ok(NotificationPriority::Normal),
        "High" => Ok(NotificationPriority::High),
        "Urgent" => Ok(NotificationPriority::Urgent),
        other => Err(unknown("notification priority", other)),
    }
}

pub(crate) fn notification_status_to_str(s: NotificationStatus) -> &'static str {
    match s {
        NotificationStatus::Draft => "Draft",
        NotificationStatus::Scheduled => "Scheduled",
        NotificationStatus::Sending => "Sending",
        NotificationStatus::Sent => "Sent",
        NotificationStatus::Failed => "Failed",
    }
}

pub(crate) fn parse_notification_status(s: &str) -> Result<NotificationStatus, DbError> {
    match s {
        "Draft" => Ok(NotificationStatus::Draft),
        "Scheduled" => Ok(NotificationStatus::Scheduled),
        "Sending" => Ok(NotificationStatus::Sending),
        "Sent" => Ok(NotificationStatus::Sent),
        "Failed" => Ok(NotificationStatus::Failed),
        other => Err(unknown("notification status", other)),
    }
}

pub(crate) fn parse_delivery_status(s: &str) -> Result<DeliveryStatus, DbError> {
    match s {
        "Pending" => Ok(DeliveryStatus::Pending),
        "Delivered" => Ok(DeliveryStatus::Delivered),
        "Failed" => Ok(DeliveryStatus::Failed),
        other => Err(unknown("delivery status", other)),
    }
}
