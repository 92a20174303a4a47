//! Integration tests for the ledger repository: atomic aggregate
//! updates, replay rejection, refund transitions.

use patron_core::error::{CrmError, guard};
use patron_core::models::membership::{CreateMembership, MembershipRole};
use patron_core::models::notification::NotificationTarget;
use patron_core::models::transaction::{
    CreateTransaction, PaymentMethod, TransactionKind, TransactionStatus,
};
use patron_core::repository::{LedgerRepository, MembershipRepository, Pagination};
use patron_db::repository::{SurrealLedgerRepository, SurrealMembershipRepository};
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

async fn seed_membership(db: &Surreal<Db>, tenant_id: Uuid) -> Uuid {
    let repo = SurrealMembershipRepository::new(db.clone());
    repo.create(CreateMembership {
        tenant_id,
        customer_id: Uuid::new_v4(),
        role: MembershipRole::Customer,
    })
    .await
    .unwrap()
    .id
}

fn purchase(
    tenant_id: Uuid,
    membership_id: Uuid,
    code: &str,
    amount: Decimal,
    tax: Decimal,
    points: i64,
) -> CreateTransaction {
    CreateTransaction {
        tenant_id,
        membership_id,
        kind: TransactionKind::Purchase,
        status: TransactionStatus::Completed,
        amount,
        tax,
        total: amount + tax,
        payment_method: PaymentMethod::Card,
        points_earned: points,
        points_redeemed: 0,
        code: code.into(),
        description: String::new(),
        processed_by: None,
    }
}

#[tokio::test]
async fn completed_purchase_updates_aggregates_exactly() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    // 49.99 + 5.00 tax, 54 points on the floored total.
    let tx = ledger
        .record(purchase(
            tenant_id,
            membership_id,
            "TXN-A1B2C3D4E5F6",
            Decimal::new(4999, 2),
            Decimal::new(500, 2),
            54,
        ))
        .await
        .unwrap();

    assert_eq!(tx.total, Decimal::new(5499, 2));
    assert_eq!(tx.points_earned, 54);
    assert_eq!(tx.status, TransactionStatus::Completed);

    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 54);
    assert_eq!(m.total_purchases, Decimal::new(5499, 2));
    assert_eq!(m.purchase_count, 1);
    assert!(m.last_purchase_at.is_some());
}

#[tokio::test]
async fn duplicate_code_is_rejected_without_side_effects() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    ledger
        .record(purchase(
            tenant_id,
            membership_id,
            "TXN-REPLAY000001",
            Decimal::new(1000, 2),
            Decimal::ZERO,
            10,
        ))
        .await
        .unwrap();

    let replay = ledger
        .record(purchase(
            tenant_id,
            membership_id,
            "TXN-REPLAY000001",
            Decimal::new(1000, 2),
            Decimal::ZERO,
            10,
        ))
        .await;
    assert!(matches!(replay, Err(CrmError::AlreadyExists { .. })));

    // Aggregates reflect the first write only.
    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 10);
    assert_eq!(m.purchase_count, 1);
}

#[tokio::test]
async fn pending_purchase_leaves_aggregates_untouched() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    let mut input = purchase(
        tenant_id,
        membership_id,
        "TXN-PENDING00001",
        Decimal::new(2500, 2),
        Decimal::ZERO,
        25,
    );
    input.status = TransactionStatus::Pending;
    ledger.record(input).await.unwrap();

    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 0);
    assert_eq!(m.purchase_count, 0);
}

#[tokio::test]
async fn adjustment_moves_points_and_is_floored() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    let credit = CreateTransaction {
        tenant_id,
        membership_id,
        kind: TransactionKind::Adjustment,
        status: TransactionStatus::Completed,
        amount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
        payment_method: PaymentMethod::Other,
        points_earned: 30,
        points_redeemed: 0,
        code: "TXN-ADJCREDIT001".into(),
        description: "goodwill credit".into(),
        processed_by: None,
    };
    ledger.record(credit.clone()).await.unwrap();

    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 30);
    // Adjustments never touch the purchase aggregates.
    assert_eq!(m.purchase_count, 0);
    assert_eq!(m.total_purchases, Decimal::ZERO);

    // Debiting more than the balance is refused atomically.
    let mut debit = credit;
    debit.points_earned = -31;
    debit.code = "TXN-ADJDEBIT0001".into();
    let result = ledger.record(debit).await;
    match result {
        Err(CrmError::Validation { message }) => {
            assert_eq!(message, guard::INSUFFICIENT_POINTS);
        }
        other => panic!("expected insufficient_points, got {other:?}"),
    }
}

#[tokio::test]
async fn adjustment_points_redeemed_debits_the_balance() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    ledger
        .record(purchase(
            tenant_id,
            membership_id,
            "TXN-FUND00000001",
            Decimal::new(3000, 2),
            Decimal::ZERO,
            30,
        ))
        .await
        .unwrap();

    // A point reversal is an adjustment row with points_redeemed set.
    let reversal = CreateTransaction {
        tenant_id,
        membership_id,
        kind: TransactionKind::Adjustment,
        status: TransactionStatus::Completed,
        amount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
        payment_method: PaymentMethod::Other,
        points_earned: 0,
        points_redeemed: 10,
        code: "TXN-REVERSE00001".into(),
        description: "refund point reversal".into(),
        processed_by: None,
    };
    ledger.record(reversal.clone()).await.unwrap();

    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 20);

    // Reversing more than the balance is refused atomically.
    let mut over = reversal;
    over.points_redeemed = 21;
    over.code = "TXN-REVERSE00002".into();
    match ledger.record(over).await {
        Err(CrmError::Validation { message }) => {
            assert_eq!(message, guard::INSUFFICIENT_POINTS);
        }
        other => panic!("expected insufficient_points, got {other:?}"),
    }
}

#[tokio::test]
async fn purchase_redeeming_more_than_the_balance_is_refused() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    let mut input = purchase(
        tenant_id,
        membership_id,
        "TXN-OVERSPEND001",
        Decimal::new(1000, 2),
        Decimal::ZERO,
        5,
    );
    input.points_redeemed = 20;
    match ledger.record(input).await {
        Err(CrmError::Validation { message }) => {
            assert_eq!(message, guard::INSUFFICIENT_POINTS);
        }
        other => panic!("expected insufficient_points, got {other:?}"),
    }

    // The whole transaction rolled back: no ledger row, no aggregates.
    assert!(
        ledger
            .get_by_code(tenant_id, "TXN-OVERSPEND001")
            .await
            .is_err()
    );
    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 0);
    assert_eq!(m.purchase_count, 0);
}

#[tokio::test]
async fn mark_refunded_transitions_once_and_keeps_points() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    let tx = ledger
        .record(purchase(
            tenant_id,
            membership_id,
            "TXN-REFUNDME0001",
            Decimal::new(2000, 2),
            Decimal::ZERO,
            20,
        ))
        .await
        .unwrap();

    let refunded = ledger.mark_refunded(tenant_id, tx.id).await.unwrap();
    assert_eq!(refunded.status, TransactionStatus::Refunded);

    // Points stay until an explicit adjustment reverses them.
    let m = memberships
        .get_by_id(tenant_id, membership_id)
        .await
        .unwrap();
    assert_eq!(m.loyalty_points, 20);

    // A second transition is refused.
    assert!(ledger.mark_refunded(tenant_id, tx.id).await.is_err());
}

#[tokio::test]
async fn record_requires_existing_membership() {
    let db = setup().await;
    let ledger = SurrealLedgerRepository::new(db);

    let result = ledger
        .record(purchase(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "TXN-NOMEMBER0001",
            Decimal::new(100, 2),
            Decimal::ZERO,
            1,
        ))
        .await;
    assert!(matches!(result, Err(CrmError::NotFound { .. })));
}

#[tokio::test]
async fn ledger_queries_by_code_and_membership() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let membership_id = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db);

    for i in 0..3 {
        ledger
            .record(purchase(
                tenant_id,
                membership_id,
                &format!("TXN-LIST0000000{i}"),
                Decimal::new(500, 2),
                Decimal::ZERO,
                5,
            ))
            .await
            .unwrap();
    }

    let by_code = ledger
        .get_by_code(tenant_id, "TXN-LIST00000001")
        .await
        .unwrap();
    assert_eq!(by_code.code, "TXN-LIST00000001");

    // Code lookup is tenant-scoped.
    assert!(
        ledger
            .get_by_code(Uuid::new_v4(), "TXN-LIST00000001")
            .await
            .is_err()
    );

    let page = ledger
        .list_for_membership(
            tenant_id,
            membership_id,
            Pagination {
                offset: 0,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn point_range_targeting_sees_ledger_balances() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();
    let rich = seed_membership(&db, tenant_id).await;
    let poor = seed_membership(&db, tenant_id).await;
    let ledger = SurrealLedgerRepository::new(db.clone());
    let memberships = SurrealMembershipRepository::new(db);

    ledger
        .record(purchase(
            tenant_id,
            rich,
            "TXN-RICH00000001",
            Decimal::new(50000, 2),
            Decimal::ZERO,
            500,
        ))
        .await
        .unwrap();
    ledger
        .record(purchase(
            tenant_id,
            poor,
            "TXN-POOR00000001",
            Decimal::new(500, 2),
            Decimal::ZERO,
            5,
        ))
        .await
        .unwrap();

    let audience = memberships
        .list_audience(
            tenant_id,
            &NotificationTarget {
                min_points: Some(100),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(audience.len(), 1);
    assert_eq!(audience[0].id, rich);
}
