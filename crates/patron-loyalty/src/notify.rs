//! Notification service — audience resolution and send orchestration.

use chrono::{DateTime, Utc};
use patron_core::models::notification::{Notification, NotificationStatus};
use patron_core::repository::{MembershipRepository, NotificationRepository};
use uuid::Uuid;

use crate::error::{LoyaltyError, LoyaltyResult};

/// Notification fan-out service.
pub struct NotificationService<N: NotificationRepository, M: MembershipRepository> {
    notification_repo: N,
    membership_repo: M,
}

impl<N: NotificationRepository, M: MembershipRepository> NotificationService<N, M> {
    pub fn new(notification_repo: N, membership_repo: M) -> Self {
        Self {
            notification_repo,
            membership_repo,
        }
    }

    /// Send a notification: resolve the audience exactly once,
    /// materialize the recipient rows and finalize the counters.
    ///
    /// The audience is evaluated at send time, not at creation time, so
    /// a scheduled promotion reaches the customers who qualify when it
    /// actually goes out. Resending after a partial failure is safe:
    /// recipient materialization is idempotent.
    pub async fn send(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
    ) -> LoyaltyResult<Notification> {
        let notification = self
            .notification_repo
            .get_by_id(tenant_id, notification_id)
            .await?;

        if matches!(
            notification.status,
            NotificationStatus::Sent | NotificationStatus::Sending
        ) {
            return Err(LoyaltyError::InvalidState(format!(
                "notification is already {:?}",
                notification.status
            )));
        }

        let audience = self
            .membership_repo
            .list_audience(tenant_id, &notification.target)
            .await?;

        if audience.is_empty() {
            tracing::warn!(%tenant_id, %notification_id, "empty audience, send failed");
            return Ok(self
                .notification_repo
                .mark_failed(tenant_id, notification_id)
                .await?);
        }

        self.notification_repo
            .mark_sending(tenant_id, notification_id)
            .await?;

        let membership_ids: Vec<Uuid> = audience.iter().map(|m| m.id).collect();
        let recipients = match self
            .notification_repo
            .add_recipients(tenant_id, notification_id, &membership_ids)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                let _ = self
                    .notification_repo
                    .mark_failed(tenant_id, notification_id)
                    .await;
                return Err(e.into());
            }
        };

        let sent = self
            .notification_repo
            .finalize_send(tenant_id, notification_id, recipients)
            .await?;

        tracing::info!(%tenant_id, %notification_id, recipients, "notification sent");
        Ok(sent)
    }

    /// Scheduled notifications due at `now`, for the periodic send job.
    pub async fn list_due(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> LoyaltyResult<Vec<Notification>> {
        Ok(self
            .notification_repo
            .list_due_scheduled(tenant_id, now)
            .await?)
    }

    /// Flip a recipient to read. Returns `false` when it already was.
    pub async fn mark_read(&self, tenant_id: Uuid, recipient_id: Uuid) -> LoyaltyResult<bool> {
        Ok(self
            .notification_repo
            .mark_read(tenant_id, recipient_id)
            .await?)
    }

    /// Flip a recipient back to unread. Returns `false` when it already
    /// was.
    pub async fn mark_unread(&self, tenant_id: Uuid, recipient_id: Uuid) -> LoyaltyResult<bool> {
        Ok(self
            .notification_repo
            .mark_unread(tenant_id, recipient_id)
            .await?)
    }

    /// Unread-message badge count for a membership.
    pub async fn unread_count(&self, tenant_id: Uuid, membership_id: Uuid) -> LoyaltyResult<u64> {
        Ok(self
            .notification_repo
            .unread_count(tenant_id, membership_id)
            .await?)
    }
}
