//! Integration tests for the ledger service defaults and policies,
//! wired against the SurrealDB repositories on an in-memory engine.

use patron_core::models::membership::{CreateMembership, Membership, MembershipRole};
use patron_core::models::tenant::{CreateTenant, Tenant, UpdateTenantSettings};
use patron_core::models::transaction::{
    PaymentMethod, TransactionKind, TransactionStatus,
};
use patron_core::repository::{MembershipRepository, TenantRepository};
use patron_db::repository::{
    SurrealLedgerRepository, SurrealMembershipRepository, SurrealTenantRepository,
};
use patron_loyalty::error::LoyaltyError;
use patron_loyalty::ledger::{LedgerService, RecordTransaction};
use rust_decimal::Decimal;
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
) -> LedgerService<SurrealLedgerRepository<Db>, SurrealTenantRepository<Db>> {
    LedgerService::new(
        SurrealLedgerRepository::new(db.clone()),
        SurrealTenantRepository::new(db.clone()),
    )
}

async fn seed_tenant_and_membership(db: &Surreal<Db>) -> (Tenant, Membership) {
    let (tenant, _) = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Simi Food".into(),
            slug: format!("t{}", &Uuid::new_v4().simple().to_string()[..8]),
            business_email: "hello@simifood.test".into(),
            owner_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    let membership = SurrealMembershipRepository::new(db.clone())
        .create(CreateMembership {
            tenant_id: tenant.id,
            customer_id: Uuid::new_v4(),
            role: MembershipRole::Customer,
        })
        .await
        .unwrap();
    (tenant, membership)
}

fn purchase(amount: Decimal, tax: Decimal) -> RecordTransaction {
    RecordTransaction {
        kind: TransactionKind::Purchase,
        status: TransactionStatus::Completed,
        amount,
        tax,
        total: None,
        payment_method: PaymentMethod::Card,
        points_earned: None,
        points_redeemed: 0,
        code: None,
        description: String::new(),
        processed_by: None,
    }
}

#[tokio::test]
async fn defaults_fill_total_points_and_code() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    // 49.99 + 5.00 at the default rate of 1 point per whole unit.
    let tx = ledger
        .record(&membership, purchase(Decimal::new(4999, 2), Decimal::new(500, 2)))
        .await
        .unwrap();

    assert_eq!(tx.total, Decimal::new(5499, 2));
    assert_eq!(tx.points_earned, 54);
    assert!(tx.code.starts_with("TXN-"));
    assert_eq!(tx.code.len(), 16);

    let m = SurrealMembershipRepository::new(db)
        .get_by_id(tenant.id, membership.id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 54);
    assert_eq!(m.total_purchases, Decimal::new(5499, 2));
    assert_eq!(m.purchase_count, 1);
}

#[tokio::test]
async fn configured_rate_scales_points() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    SurrealTenantRepository::new(db.clone())
        .update_settings(
            tenant.id,
            UpdateTenantSettings {
                points_per_currency_unit: Some(Decimal::new(2, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let tx = service(&db)
        .record(&membership, purchase(Decimal::new(5499, 2), Decimal::ZERO))
        .await
        .unwrap();
    assert_eq!(tx.points_earned, 108);
}

#[tokio::test]
async fn disabled_loyalty_earns_no_points() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    SurrealTenantRepository::new(db.clone())
        .update_settings(
            tenant.id,
            UpdateTenantSettings {
                loyalty_enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let tx = service(&db)
        .record(&membership, purchase(Decimal::new(5000, 2), Decimal::ZERO))
        .await
        .unwrap();
    assert_eq!(tx.points_earned, 0);
}

#[tokio::test]
async fn explicit_points_override_the_computed_value() {
    let db = setup().await;
    let (_, membership) = seed_tenant_and_membership(&db).await;

    let mut input = purchase(Decimal::new(5000, 2), Decimal::ZERO);
    input.points_earned = Some(500);
    let tx = service(&db).record(&membership, input).await.unwrap();
    assert_eq!(tx.points_earned, 500);
}

#[tokio::test]
async fn negative_amounts_are_rejected_before_any_write() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    let result = ledger
        .record(&membership, purchase(Decimal::new(-100, 2), Decimal::ZERO))
        .await;
    assert!(matches!(result, Err(LoyaltyError::InvalidAmount(_))));

    let result = ledger
        .record(&membership, purchase(Decimal::new(100, 2), Decimal::new(-1, 2)))
        .await;
    assert!(matches!(result, Err(LoyaltyError::InvalidAmount(_))));

    let m = SurrealMembershipRepository::new(db)
        .get_by_id(tenant.id, membership.id)
        .await
        .unwrap();
    assert_eq!(m.purchase_count, 0);
}

#[tokio::test]
async fn replayed_code_is_a_duplicate_transaction() {
    let db = setup().await;
    let (_, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    let mut input = purchase(Decimal::new(1000, 2), Decimal::ZERO);
    input.code = Some("TXN-REPLAY000001".into());
    ledger.record(&membership, input.clone()).await.unwrap();

    let replay = ledger.record(&membership, input).await;
    match replay {
        Err(LoyaltyError::DuplicateTransaction { code }) => {
            assert_eq!(code, "TXN-REPLAY000001");
        }
        other => panic!("expected DuplicateTransaction, got {other:?}"),
    }
}

#[tokio::test]
async fn refund_policy_keeps_points_and_is_single_shot() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    let tx = ledger
        .record(&membership, purchase(Decimal::new(2000, 2), Decimal::ZERO))
        .await
        .unwrap();

    let refunded = ledger.mark_refunded(tenant.id, tx.id).await.unwrap();
    assert_eq!(refunded.status, TransactionStatus::Refunded);

    // Points stay; reversing them takes an explicit adjustment.
    let m = SurrealMembershipRepository::new(db)
        .get_by_id(tenant.id, membership.id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 20);

    let again = ledger.mark_refunded(tenant.id, tx.id).await;
    assert!(matches!(again, Err(LoyaltyError::NotRefundable)));
}

#[tokio::test]
async fn adjustment_reversal_debits_the_earned_points() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    let tx = ledger
        .record(&membership, purchase(Decimal::new(2000, 2), Decimal::ZERO))
        .await
        .unwrap();
    ledger.mark_refunded(tenant.id, tx.id).await.unwrap();

    // The documented reversal: an adjustment row carrying the refunded
    // points as points_redeemed.
    let reversal = RecordTransaction {
        kind: TransactionKind::Adjustment,
        status: TransactionStatus::Completed,
        amount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: None,
        payment_method: PaymentMethod::Other,
        points_earned: Some(0),
        points_redeemed: 20,
        code: None,
        description: format!("reversal of {}", tx.code),
        processed_by: None,
    };
    ledger.record(&membership, reversal).await.unwrap();

    let m = SurrealMembershipRepository::new(db)
        .get_by_id(tenant.id, membership.id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 0);
    // The purchase aggregates are untouched by the reversal.
    assert_eq!(m.purchase_count, 1);
}

#[tokio::test]
async fn pending_transactions_are_not_refundable() {
    let db = setup().await;
    let (tenant, membership) = seed_tenant_and_membership(&db).await;
    let ledger = service(&db);

    let mut input = purchase(Decimal::new(1500, 2), Decimal::ZERO);
    input.status = TransactionStatus::Pending;
    let tx = ledger.record(&membership, input).await.unwrap();

    let result = ledger.mark_refunded(tenant.id, tx.id).await;
    assert!(matches!(result, Err(LoyaltyError::NotRefundable)));
}
