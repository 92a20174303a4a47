//! Integration tests for notification send orchestration.

use chrono::{Duration, Utc};
use patron_core::models::membership::{CreateMembership, MembershipRole, UpdateMembership};
use patron_core::models::notification::{
    CreateNotification, NotificationCategory, NotificationPriority, NotificationStatus,
    NotificationTarget,
};
use patron_core::repository::{MembershipRepository, NotificationRepository, Pagination};
use patron_db::repository::{SurrealMembershipRepository, SurrealNotificationRepository};
use patron_loyalty::error::LoyaltyError;
use patron_loyalty::notify::NotificationService;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    patron_db::run_migrations(&db).await.unwrap();
    db
}

fn service(
    db: &Surreal<Db>,
) -> NotificationService<SurrealNotificationRepository<Db>, SurrealMembershipRepository<Db>> {
    NotificationService::new(
        SurrealNotificationRepository::new(db.clone()),
        SurrealMembershipRepository::new(db.clone()),
    )
}

async fn seed_customers(db: &Surreal<Db>, tenant_id: Uuid, count: usize, vip: usize) -> Vec<Uuid> {
    let repo = SurrealMembershipRepository::new(db.clone());
    let mut ids = Vec::new();
    for i in 0..count {
        let m = repo
            .create(CreateMembership {
                tenant_id,
                customer_id: Uuid::new_v4(),
                role: MembershipRole::Customer,
            })
            .await
            .unwrap();
        if i < vip {
            repo.update(
                tenant_id,
                m.id,
                UpdateMembership {
                    is_vip: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        ids.push(m.id);
    }
    ids
}

fn create_input(tenant_id: Uuid, target: NotificationTarget) -> CreateNotification {
    CreateNotification {
        tenant_id,
        created_by: None,
        title: "Weekend special".into(),
        message: "Double points all weekend.".into(),
        category: NotificationCategory::Promotion,
        priority: NotificationPriority::Normal,
        target,
        scheduled_for: None,
    }
}

#[tokio::test]
async fn send_reaches_the_full_audience() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    seed_customers(&db, tenant_id, 3, 0).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    let notification = repo
        .create(create_input(tenant_id, NotificationTarget::default()))
        .await
        .unwrap();

    let sent = notify.send(tenant_id, notification.id).await.unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.total_recipients, 3);
    assert_eq!(sent.total_delivered, 3);
    assert!(sent.sent_at.is_some());
}

#[tokio::test]
async fn vip_targeting_reaches_three_of_ten() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let ids = seed_customers(&db, tenant_id, 10, 3).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    let notification = repo
        .create(create_input(
            tenant_id,
            NotificationTarget {
                vip_only: true,
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    let sent = notify.send(tenant_id, notification.id).await.unwrap();
    assert_eq!(sent.total_recipients, 3);

    let recipients = repo
        .list_recipients(tenant_id, notification.id, Pagination::default())
        .await
        .unwrap();
    for r in &recipients.items {
        assert!(ids[..3].contains(&r.membership_id));
    }
}

#[tokio::test]
async fn empty_audience_marks_the_send_failed() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    seed_customers(&db, tenant_id, 2, 0).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    // Explicit targeting with no ids means nobody, not everybody.
    let notification = repo
        .create(create_input(
            tenant_id,
            NotificationTarget {
                all: false,
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    let outcome = notify.send(tenant_id, notification.id).await.unwrap();
    assert_eq!(outcome.status, NotificationStatus::Failed);
    assert_eq!(outcome.total_recipients, 0);
}

#[tokio::test]
async fn resending_a_sent_notification_is_refused() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    seed_customers(&db, tenant_id, 2, 0).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    let notification = repo
        .create(create_input(tenant_id, NotificationTarget::default()))
        .await
        .unwrap();
    notify.send(tenant_id, notification.id).await.unwrap();

    let again = notify.send(tenant_id, notification.id).await;
    assert!(matches!(again, Err(LoyaltyError::InvalidState(_))));
}

#[tokio::test]
async fn failed_send_can_be_retried() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    // First attempt fails on an empty tenant.
    let notification = repo
        .create(create_input(tenant_id, NotificationTarget::default()))
        .await
        .unwrap();
    let failed = notify.send(tenant_id, notification.id).await.unwrap();
    assert_eq!(failed.status, NotificationStatus::Failed);

    // Audience appears, the retry goes through.
    seed_customers(&db, tenant_id, 2, 0).await;
    let sent = notify.send(tenant_id, notification.id).await.unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.total_recipients, 2);
}

#[tokio::test]
async fn scheduled_notifications_flow_through_list_due() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    seed_customers(&db, tenant_id, 2, 0).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    let mut input = create_input(tenant_id, NotificationTarget::default());
    input.scheduled_for = Some(Utc::now() - Duration::minutes(1));
    let due = repo.create(input).await.unwrap();
    assert_eq!(due.status, NotificationStatus::Scheduled);

    let picked = notify.list_due(tenant_id, Utc::now()).await.unwrap();
    assert_eq!(picked.len(), 1);

    let sent = notify.send(tenant_id, picked[0].id).await.unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);

    // Once sent it no longer shows up as due.
    assert!(notify.list_due(tenant_id, Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn read_toggles_flow_through_the_service() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let members = seed_customers(&db, tenant_id, 1, 0).await;
    let repo = SurrealNotificationRepository::new(db.clone());
    let notify = service(&db);

    let notification = repo
        .create(create_input(tenant_id, NotificationTarget::default()))
        .await
        .unwrap();
    notify.send(tenant_id, notification.id).await.unwrap();

    assert_eq!(notify.unread_count(tenant_id, members[0]).await.unwrap(), 1);

    let inbox = repo
        .list_for_membership(tenant_id, members[0], Pagination::default())
        .await
        .unwrap();
    let recipient_id = inbox.items[0].id;

    assert!(notify.mark_read(tenant_id, recipient_id).await.unwrap());
    assert!(!notify.mark_read(tenant_id, recipient_id).await.unwrap());
    assert_eq!(notify.unread_count(tenant_id, members[0]).await.unwrap(), 0);

    assert!(notify.mark_unread(tenant_id, recipient_id).await.unwrap());
    assert_eq!(notify.unread_count(tenant_id, members[0]).await.unwrap(), 1);
}
