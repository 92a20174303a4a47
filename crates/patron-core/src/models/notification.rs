//! Notification domain model — tenant-authored messages and their
//! per-membership delivery fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCategory {
    Promotion,
    Announcement,
    Birthday,
    Reminder,
    Alert,
    Update,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Draft,
    /// Due for delivery at `scheduled_for`; an external periodic job
    /// picks these up and calls `send`.
    Scheduled,
    Sending,
    Sent,
    Failed,
}

/// Audience selection, evaluated exactly once at send time.
///
/// Base set = active customer-role memberships of the tenant. When
/// `all` is false the explicit `membership_ids` list replaces the base
/// set (an empty list means an empty audience, not "everyone"). The
/// VIP and point-range filters then intersect whatever remains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub all: bool,
    pub membership_ids: Vec<Uuid>,
    pub vip_only: bool,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
}

impl Default for NotificationTarget {
    fn default() -> Self {
        Self {
            all: true,
            membership_ids: Vec::new(),
            vip_only: false,
            min_points: None,
            max_points: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Staff member who composed the message.
    pub created_by: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub target: NotificationTarget,
    pub status: NotificationStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Counters maintained by the fan-out/read operations; always equal
    /// to the actual recipient-row statistics.
    pub total_recipients: i64,
    pub total_delivered: i64,
    pub total_read: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Read percentage for dashboards, one decimal place.
    pub fn read_rate(&self) -> f64 {
        if self.total_delivered > 0 {
            (self.total_read as f64 / self.total_delivered as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub target: NotificationTarget,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

/// Delivery/read tracking for one (notification, membership) pair.
///
/// Exactly one row exists per pair; fan-out uses get-or-create
/// semantics so resending never duplicates recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecipient {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub membership_id: Uuid,
    pub delivery_status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
