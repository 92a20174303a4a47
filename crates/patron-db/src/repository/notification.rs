//! SurrealDB implementation of [`NotificationRepository`].
//!
//! Recipient rows carry deterministic ids derived from the
//! (notification, membership) pair, so fan-out is an UPSERT and
//! resending can never duplicate a recipient. Read toggles adjust the
//! parent counter in the same transaction as the flag flip.

use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::notification::{
    CreateNotification, Notification, NotificationRecipient, NotificationTarget,
};
use patron_core::repository::{NotificationRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::{
    notification_category_to_str, notification_priority_to_str, notification_status_to_str,
    parse_delivery_status, parse_notification_category, parse_notification_priority,
    parse_notification_status, parse_opt_uuid, parse_uuid,
};

const NOTIFICATION_FIELDS: &str = "\
    meta::id(id) AS record_id, tenant_id, created_by, title, message, \
    category, priority, target, status, scheduled_for, sent_at, \
    total_recipients, total_delivered, total_read, created_at, \
    updated_at";

const RECIPIENT_FIELDS: &str = "\
    meta::id(id) AS record_id, notification_id, membership_id, \
    delivery_status, delivered_at, is_read, read_at, created_at";

/// Deterministic recipient record id for one
/// (notification, membership) pair.
fn recipient_id(notification_id: Uuid, membership_id: Uuid) -> Uuid {
    Uuid::new_v5(&notification_id, membership_id.as_bytes())
}

#[derive(Debug, SurrealValue)]
struct NotificationRow {
    record_id: String,
    tenant_id: String,
    created_by: Option<String>,
    title: String,
    message: String,
    category: String,
    priority: String,
    target: serde_json::Value,
    status: String,
    scheduled_for: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    total_recipients: i64,
    total_delivered: i64,
    total_read: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NotificationRow {
    fn try_into_notification(self) -> Result<Notification, DbError> {
        let target: NotificationTarget = serde_json::from_value(self.target)
            .map_err(|e| DbError::Query(format!("invalid notification target: {e}")))?;
        Ok(Notification {
            id: parse_uuid("notification", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            created_by: parse_opt_uuid("customer", self.created_by)?,
            title: self.title,
            message: self.message,
            category: parse_notification_category(&self.category)?,
            priority: parse_notification_priority(&self.priority)?,
            target,
            status: parse_notification_status(&self.status)?,
            scheduled_for: self.scheduled_for,
            sent_at: self.sent_at,
            total_recipients: self.total_recipients,
            total_delivered: self.total_delivered,
            total_read: self.total_read,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RecipientRow {
    record_id: String,
    notification_id: String,
    membership_id: String,
    delivery_status: String,
    delivered_at: Option<DateTime<Utc>>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RecipientRow {
    fn try_into_recipient(self) -> Result<NotificationRecipient, DbError> {
        Ok(NotificationRecipient {
            id: parse_uuid("notification_recipient", &self.record_id)?,
            notification_id: parse_uuid("notification", &self.notification_id)?,
            membership_id: parse_uuid("membership", &self.membership_id)?,
            delivery_status: parse_delivery_status(&self.delivery_status)?,
            delivered_at: self.delivered_at,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Minimal recipient projection used by the read toggles.
#[derive(Debug, SurrealValue)]
struct RecipientStateRow {
    notification_id: String,
    is_read: bool,
}

/// SurrealDB implementation of the notification repository.
#[derive(Clone)]
pub struct SurrealNotificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealNotificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Notification, DbError> {
        let query = format!(
            "SELECT {NOTIFICATION_FIELDS} FROM type::record('notification', $id) \
             WHERE tenant_id = $tenant_id"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<NotificationRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "notification".into(),
            id: id.to_string(),
        })?;
        row.try_into_notification()
    }

    async fn recipient_state(
        &self,
        tenant_id: &str,
        recipient_id: &str,
    ) -> Result<RecipientStateRow, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT notification_id, is_read FROM \
                 type::record('notification_recipient', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", recipient_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<RecipientStateRow> = result.take(0)?;
        rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "notification_recipient".into(),
            id: recipient_id.to_string(),
        })
    }
}

impl<C: Connection> NotificationRepository for SurrealNotificationRepository<C> {
    async fn create(&self, input: CreateNotification) -> CrmResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();

        // Drafts become scheduled as soon as a send time is attached.
        let status = if input.scheduled_for.is_some() {
            "Scheduled"
        } else {
            "Draft"
        };
        let target = serde_json::to_value(&input.target)
            .map_err(|e| DbError::Query(format!("invalid notification target: {e}")))?;

        let result = self
            .db
            .query(
                "CREATE type::record('notification', $id) SET \
                 tenant_id = $tenant_id, created_by = $created_by, \
                 title = $title, message = $message, \
                 category = $category, priority = $priority, \
                 target = $target, status = $status, \
                 scheduled_for = $scheduled_for RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .bind(("title", input.title))
            .bind(("message", input.message))
            .bind((
                "category",
                notification_category_to_str(input.category).to_string(),
            ))
            .bind((
                "priority",
                notification_priority_to_str(input.priority).to_string(),
            ))
            .bind(("target", target))
            .bind(("status", status.to_string()))
            .bind(("scheduled_for", input.scheduled_for))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "notification"))?;

        Ok(self.fetch(&tenant_id_str, &id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Notification> {
        Ok(self.fetch(&tenant_id.to_string(), &id.to_string()).await?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<Notification>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM notification \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {NOTIFICATION_FIELDS} FROM notification \
             WHERE tenant_id = $tenant_id \
             ORDER BY created_at DESC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<NotificationRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(NotificationRow::try_into_notification)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_due_scheduled(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> CrmResult<Vec<Notification>> {
        let query = format!(
            "SELECT {NOTIFICATION_FIELDS} FROM notification \
             WHERE tenant_id = $tenant_id AND status = 'Scheduled' \
             AND scheduled_for != NONE AND scheduled_for <= $now \
             ORDER BY scheduled_for ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<NotificationRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(NotificationRow::try_into_notification)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn mark_sending(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<()> {
        self.db
            .query(
                "UPDATE type::record('notification', $id) SET \
                 status = 'Sending', updated_at = time::now() \
                 WHERE tenant_id = $tenant_id RETURN NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn add_recipients(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        membership_ids: &[Uuid],
    ) -> CrmResult<u64> {
        let notification_id_str = notification_id.to_string();

        if !membership_ids.is_empty() {
            let pairs: Vec<serde_json::Value> = membership_ids
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": recipient_id(notification_id, *m).to_string(),
                        "membership_id": m.to_string(),
                    })
                })
                .collect();

            // UPSERT keyed on the deterministic id: new pairs are
            // created, existing ones keep their read state;
            // delivered_at is only stamped once.
            let result = self
                .db
                .query(
                    "FOR $p IN $pairs { \
                     UPSERT type::record('notification_recipient', $p.id) SET \
                     tenant_id = $tenant_id, \
                     notification_id = $notification_id, \
                     membership_id = $p.membership_id, \
                     delivery_status = 'Delivered', \
                     delivered_at = delivered_at ?? time::now(); \
                     };",
                )
                .bind(("pairs", pairs))
                .bind(("tenant_id", tenant_id.to_string()))
                .bind(("notification_id", notification_id_str.clone()))
                .await
                .map_err(DbError::from)?;

            result
                .check()
                .map_err(|e| DbError::classify(e, "notification_recipient"))?;
        }

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM notification_recipient \
                 WHERE notification_id = $notification_id GROUP ALL",
            )
            .bind(("notification_id", notification_id_str))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn finalize_send(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        recipients: u64,
    ) -> CrmResult<Notification> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('notification', $id) SET \
                 status = 'Sent', sent_at = time::now(), \
                 total_recipients = $recipients, \
                 total_delivered = $recipients, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id RETURN NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("recipients", recipients))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "notification"))?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }

    async fn mark_failed(&self, tenant_id: Uuid, id: Uuid) -> CrmResult<Notification> {
        let id_str = id.to_string();
        let tenant_id_str = tenant_id.to_string();

        self.db
            .query(
                "UPDATE type::record('notification', $id) SET \
                 status = 'Failed', updated_at = time::now() \
                 WHERE tenant_id = $tenant_id RETURN NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        Ok(self.fetch(&tenant_id_str, &id_str).await?)
    }

    async fn list_recipients(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<NotificationRecipient>> {
        let tenant_id_str = tenant_id.to_string();
        let notification_id_str = notification_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM notification_recipient \
                 WHERE tenant_id = $tenant_id \
                 AND notification_id = $notification_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("notification_id", notification_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {RECIPIENT_FIELDS} FROM notification_recipient \
             WHERE tenant_id = $tenant_id \
             AND notification_id = $notification_id \
             ORDER BY created_at ASC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("notification_id", notification_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RecipientRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RecipientRow::try_into_recipient)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_membership(
        &self,
        tenant_id: Uuid,
        membership_id: Uuid,
        pagination: Pagination,
    ) -> CrmResult<PaginatedResult<NotificationRecipient>> {
        let tenant_id_str = tenant_id.to_string();
        let membership_id_str = membership_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM notification_recipient \
                 WHERE tenant_id = $tenant_id \
                 AND membership_id = $membership_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("membership_id", membership_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT {RECIPIENT_FIELDS} FROM notification_recipient \
             WHERE tenant_id = $tenant_id \
             AND membership_id = $membership_id \
             ORDER BY created_at DESC LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id_str))
            .bind(("membership_id", membership_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RecipientRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RecipientRow::try_into_recipient)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn unread_count(&self, tenant_id: Uuid, membership_id: Uuid) -> CrmResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM notification_recipient \
                 WHERE tenant_id = $tenant_id \
                 AND membership_id = $membership_id \
                 AND is_read = false GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("membership_id", membership_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn mark_read(&self, tenant_id: Uuid, recipient_id: Uuid) -> CrmResult<bool> {
        let tenant_id_str = tenant_id.to_string();
        let recipient_id_str = recipient_id.to_string();

        let state = self
            .recipient_state(&tenant_id_str, &recipient_id_str)
            .await?;
        if state.is_read {
            return Ok(false);
        }

        // The counter increment and the returned bool are both tied to
        // the number of rows the guarded update actually flipped, so a
        // lost race adds zero and reports false.
        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $rec = (UPDATE \
                 type::record('notification_recipient', $rid) SET \
                 is_read = true, read_at = time::now() \
                 WHERE tenant_id = $tenant_id AND is_read = false); \
                 UPDATE type::record('notification', $nid) SET \
                 total_read += array::len($rec), \
                 updated_at = time::now(); \
                 RETURN array::len($rec); \
                 COMMIT TRANSACTION;",
            )
            .bind(("rid", recipient_id_str))
            .bind(("tenant_id", tenant_id_str))
            .bind(("nid", state.notification_id))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "notification_recipient"))?;
        let flipped: Option<i64> = result.take(0).map_err(DbError::from)?;

        Ok(flipped.unwrap_or(0) > 0)
    }

    async fn mark_unread(&self, tenant_id: Uuid, recipient_id: Uuid) -> CrmResult<bool> {
        let tenant_id_str = tenant_id.to_string();
        let recipient_id_str = recipient_id.to_string();

        let state = self
            .recipient_state(&tenant_id_str, &recipient_id_str)
            .await?;
        if !state.is_read {
            return Ok(false);
        }

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $rec = (UPDATE \
                 type::record('notification_recipient', $rid) SET \
                 is_read = false, read_at = NONE \
                 WHERE tenant_id = $tenant_id AND is_read = true); \
                 UPDATE type::record('notification', $nid) SET \
                 total_read = math::max([total_read - array::len($rec), 0]), \
                 updated_at = time::now(); \
                 RETURN array::len($rec); \
                 COMMIT TRANSACTION;",
            )
            .bind(("rid", recipient_id_str))
            .bind(("tenant_id", tenant_id_str))
            .bind(("nid", state.notification_id))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "notification_recipient"))?;
        let flipped: Option<i64> = result.take(0).map_err(DbError::from)?;

        Ok(flipped.unwrap_or(0) > 0)
    }
}
