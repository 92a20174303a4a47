//! Integration tests for the tenant repository using in-memory
//! SurrealDB.

use patron_core::error::CrmError;
use patron_core::models::tenant::{
    CreateTenant, SubscriptionStatus, UpdateTenant, UpdateTenantSettings,
};
use patron_core::repository::{Pagination, TenantRepository};
use patron_db::repository::SurrealTenantRepository;
use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    patron_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(slug: &str) -> CreateTenant {
    CreateTenant {
        name: "Simi Food".into(),
        slug: slug.into(),
        business_email: "hello@simifood.test".into(),
        owner_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn create_tenant_with_settings() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let (tenant, settings) = repo.create(create_input("simifood")).await.unwrap();

    assert_eq!(tenant.name, "Simi Food");
    assert_eq!(tenant.slug, "simifood");
    assert_eq!(tenant.subscription_status, SubscriptionStatus::Trial);
    assert_eq!(tenant.currency_code, "USD");
    assert_eq!(tenant.max_customers, 100);
    assert_eq!(tenant.max_staff, 3);
    assert!(tenant.is_active);

    // Settings exist from the moment the tenant does.
    assert_eq!(settings.tenant_id, tenant.id);
    assert!(settings.loyalty_enabled);
    assert_eq!(settings.points_per_currency_unit, Decimal::ONE);

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.id, tenant.id);
}

#[tokio::test]
async fn get_tenant_by_slug() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let (tenant, _) = repo.create(create_input("lookup")).await.unwrap();

    let fetched = repo.get_by_slug("lookup").await.unwrap();
    assert_eq!(fetched.id, tenant.id);

    let missing = repo.get_by_slug("nope").await;
    assert!(matches!(missing, Err(CrmError::NotFound { .. })));
}

#[tokio::test]
async fn duplicate_slug_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(create_input("taken")).await.unwrap();
    let result = repo.create(create_input("taken")).await;
    assert!(matches!(result, Err(CrmError::AlreadyExists { .. })));
}

#[tokio::test]
async fn update_tenant_fields() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let (tenant, _) = repo.create(create_input("update-me")).await.unwrap();

    let updated = repo
        .update(
            tenant.id,
            UpdateTenant {
                name: Some("Simi Food & Grill".into()),
                currency_code: Some("NGN".into()),
                currency_symbol: Some("₦".into()),
                subscription_status: Some(SubscriptionStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Simi Food & Grill");
    assert_eq!(updated.currency_symbol, "₦");
    assert_eq!(updated.subscription_status, SubscriptionStatus::Active);
    assert_eq!(updated.slug, "update-me"); // immutable
}

#[tokio::test]
async fn deactivate_is_soft() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let (tenant, _) = repo.create(create_input("inactive")).await.unwrap();
    repo.deactivate(tenant.id).await.unwrap();

    // Still readable, just inactive.
    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert!(!fetched.is_active);
}

#[tokio::test]
async fn update_settings() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let (tenant, _) = repo.create(create_input("settings")).await.unwrap();

    let settings = repo
        .update_settings(
            tenant.id,
            UpdateTenantSettings {
                loyalty_enabled: Some(false),
                points_per_currency_unit: Some(Decimal::new(2, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!settings.loyalty_enabled);
    assert_eq!(settings.points_per_currency_unit, Decimal::new(2, 0));

    let fetched = repo.get_settings(tenant.id).await.unwrap();
    assert!(!fetched.loyalty_enabled);
}

#[tokio::test]
async fn list_tenants_with_pagination() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    for i in 0..5 {
        repo.create(create_input(&format!("tenant-{i}")))
            .await
            .unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 3);

    let rest = repo
        .list(Pagination {
            offset: 3,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 2);
}
