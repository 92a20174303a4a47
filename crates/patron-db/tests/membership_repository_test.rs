//! Integration tests for the membership repository, including audience
//! resolution for notification targeting.

use patron_core::error::CrmError;
use patron_core::models::membership::{CreateMembership, MembershipRole, UpdateMembership};
use patron_core::models::notification::NotificationTarget;
use patron_core::repository::{MembershipRepository, Pagination};
use patron_db::repository::SurrealMembershipRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    patron_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn create_and_get_membership() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let membership = repo
        .create(CreateMembership {
            tenant_id,
            customer_id,
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();

    assert_eq!(membership.tenant_id, tenant_id);
    assert_eq!(membership.role, MembershipRole::Customer);
    assert_eq!(membership.loyalty_points, 0);
    assert_eq!(membership.purchase_count, 0);
    assert!(membership.is_active);
    assert!(!membership.is_vip);

    let by_customer = repo.get_by_customer(tenant_id, customer_id).await.unwrap();
    assert_eq!(by_customer.id, membership.id);
}

#[tokio::test]
async fn one_membership_per_customer_per_tenant() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    repo.create(CreateMembership {
        tenant_id,
        customer_id,
        role: MembershipRole::Customer,
    })
    .await
    .unwrap();

    let dup = repo
        .create(CreateMembership {
            tenant_id,
            customer_id,
            role: MembershipRole::Staff,
        })
        .await;
    assert!(matches!(dup, Err(CrmError::AlreadyExists { .. })));

    // Same customer in another tenant is fine.
    repo.create(CreateMembership {
        tenant_id: Uuid::new_v4(),
        customer_id,
        role: MembershipRole::Customer,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn membership_is_tenant_scoped() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    let membership = repo
        .create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();

    // Lookup under a different tenant must miss.
    let other = repo.get_by_id(Uuid::new_v4(), membership.id).await;
    assert!(matches!(other, Err(CrmError::NotFound { .. })));
}

#[tokio::test]
async fn update_membership_fields() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    let membership = repo
        .create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();

    let updated = repo
        .update(
            tenant_id,
            membership.id,
            UpdateMembership {
                role: Some(MembershipRole::Staff),
                is_vip: Some(true),
                tags: Some(vec!["frequent".into()]),
                notes: Some("prefers window seat".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.role, MembershipRole::Staff);
    assert!(updated.is_vip);
    assert_eq!(updated.tags, vec!["frequent".to_string()]);
}

#[tokio::test]
async fn remove_membership_only_unlinks() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    let membership = repo
        .create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();

    repo.remove(tenant_id, membership.id).await.unwrap();
    assert!(repo.get_by_id(tenant_id, membership.id).await.is_err());
}

#[tokio::test]
async fn list_memberships_with_pagination() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);

    let tenant_id = Uuid::new_v4();
    for _ in 0..4 {
        repo.create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();
    }

    let page = repo
        .list(
            tenant_id,
            Pagination {
                offset: 0,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 3);
}

// -----------------------------------------------------------------------
// Audience resolution
// -----------------------------------------------------------------------

async fn seed_audience(
    repo: &SurrealMembershipRepository<surrealdb::engine::local::Db>,
    tenant_id: Uuid,
) -> Vec<Uuid> {
    let mut ids = Vec::new();
    // Two plain customers, one VIP with points, one staff member, one
    // inactive customer.
    for _ in 0..2 {
        let m = repo
            .create(CreateMembership {
                tenant_id,
                customer_id: Uuid::new_v4(),
                role: MembershipRole::Customer,
            })
            .await
            .unwrap();
        ids.push(m.id);
    }
    let vip = repo
        .create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();
    repo.update(
        tenant_id,
        vip.id,
        UpdateMembership {
            is_vip: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    ids.push(vip.id);

    repo.create(CreateMembership {
        tenant_id,
        customer_id: Uuid::new_v4(),
        role: MembershipRole::Staff,
    })
    .await
    .unwrap();

    let inactive = repo
        .create(CreateMembership {
            tenant_id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();
    repo.update(
        tenant_id,
        inactive.id,
        UpdateMembership {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    ids
}

#[tokio::test]
async fn audience_all_excludes_staff_and_inactive() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);
    let tenant_id = Uuid::new_v4();
    let ids = seed_audience(&repo, tenant_id).await;

    let audience = repo
        .list_audience(tenant_id, &NotificationTarget::default())
        .await
        .unwrap();

    assert_eq!(audience.len(), 3);
    for m in &audience {
        assert!(ids.contains(&m.id));
        assert_eq!(m.role, MembershipRole::Customer);
        assert!(m.is_active);
    }
}

#[tokio::test]
async fn audience_vip_only() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);
    let tenant_id = Uuid::new_v4();
    seed_audience(&repo, tenant_id).await;

    let audience = repo
        .list_audience(
            tenant_id,
            &NotificationTarget {
                vip_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(audience.len(), 1);
    assert!(audience[0].is_vip);
}

#[tokio::test]
async fn audience_explicit_ids_replace_base_set() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);
    let tenant_id = Uuid::new_v4();
    let ids = seed_audience(&repo, tenant_id).await;

    let audience = repo
        .list_audience(
            tenant_id,
            &NotificationTarget {
                all: false,
                membership_ids: vec![ids[0]],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(audience.len(), 1);
    assert_eq!(audience[0].id, ids[0]);

    // Empty explicit list means an empty audience, not everyone.
    let empty = repo
        .list_audience(
            tenant_id,
            &NotificationTarget {
                all: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn audience_is_tenant_scoped() {
    let db = setup().await;
    let repo = SurrealMembershipRepository::new(db);
    let tenant_id = Uuid::new_v4();
    seed_audience(&repo, tenant_id).await;

    let other = repo
        .list_audience(Uuid::new_v4(), &NotificationTarget::default())
        .await
        .unwrap();
    assert!(other.is_empty());
}
