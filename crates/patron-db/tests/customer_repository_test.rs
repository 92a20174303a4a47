//! Integration tests for the customer and session repositories using
//! in-memory SurrealDB.

use chrono::{Duration, Utc};
use patron_core::error::CrmError;
use patron_core::models::customer::{CreateCustomer, UpdateCustomer};
use patron_core::models::session::CreateSession;
use patron_core::repository::{CustomerRepository, SessionRepository};
use patron_db::repository::{
    SurrealCustomerRepository, SurrealSessionRepository, verify_password,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    patron_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(email: &str) -> CreateCustomer {
    CreateCustomer {
        email: email.into(),
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        phone: None,
        password: "correct horse battery".into(),
    }
}

#[tokio::test]
async fn create_customer_hashes_password() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::new(db);

    let customer = repo.create(create_input("ada@example.test")).await.unwrap();

    assert_eq!(customer.email, "ada@example.test");
    assert_eq!(customer.full_name(), "Ada Obi");
    assert!(customer.is_active);
    assert!(!customer.is_superuser);
    // Argon2id PHC string, never the raw password.
    assert!(customer.password_hash.starts_with("$argon2id$"));
    assert!(
        verify_password("correct horse battery", &customer.password_hash, None).unwrap()
    );
    assert!(!verify_password("wrong", &customer.password_hash, None).unwrap());
}

#[tokio::test]
async fn email_lookup_is_case_insensitive() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::new(db);

    let customer = repo.create(create_input("Mixed@Example.Test")).await.unwrap();
    // Stored lowercased.
    assert_eq!(customer.email, "mixed@example.test");

    let fetched = repo.get_by_email("MIXED@example.TEST").await.unwrap();
    assert_eq!(fetched.id, customer.id);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::new(db);

    repo.create(create_input("dup@example.test")).await.unwrap();
    let result = repo.create(create_input("dup@example.test")).await;
    assert!(matches!(result, Err(CrmError::AlreadyExists { .. })));
}

#[tokio::test]
async fn update_and_deactivate_customer() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::new(db);

    let customer = repo.create(create_input("upd@example.test")).await.unwrap();

    let updated = repo
        .update(
            customer.id,
            UpdateCustomer {
                first_name: Some("Adaeze".into()),
                phone: Some("+2348000000000".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Adaeze");
    assert_eq!(updated.phone, "+2348000000000");

    repo.deactivate(customer.id).await.unwrap();
    let fetched = repo.get_by_id(customer.id).await.unwrap();
    assert!(!fetched.is_active);
}

#[tokio::test]
async fn set_password_replaces_hash() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::new(db);

    let customer = repo.create(create_input("pw@example.test")).await.unwrap();
    repo.set_password(customer.id, "new secret").await.unwrap();

    let fetched = repo.get_by_id(customer.id).await.unwrap();
    assert_ne!(fetched.password_hash, customer.password_hash);
    assert!(verify_password("new secret", &fetched.password_hash, None).unwrap());
}

#[tokio::test]
async fn pepper_changes_verification() {
    let db = setup().await;
    let repo = SurrealCustomerRepository::with_pepper(db, "server-pepper".into());

    let customer = repo.create(create_input("pep@example.test")).await.unwrap();

    assert!(verify_password(
        "correct horse battery",
        &customer.password_hash,
        Some("server-pepper"),
    )
    .unwrap());
    // Without the pepper the same password must fail.
    assert!(
        !verify_password("correct horse battery", &customer.password_hash, None).unwrap()
    );
}

// -----------------------------------------------------------------------
// Sessions
// -----------------------------------------------------------------------

fn session_input(customer_id: Uuid, tenant_id: Option<Uuid>, hash: &str) -> CreateSession {
    CreateSession {
        customer_id,
        tenant_id,
        token_hash: hash.into(),
        ip_address: Some("127.0.0.1".into()),
        user_agent: None,
        expires_at: Utc::now() + Duration::hours(8),
    }
}

#[tokio::test]
async fn create_and_lookup_session() {
    let db = setup().await;
    let repo = SurrealSessionRepository::new(db);

    let customer_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let session = repo
        .create(session_input(customer_id, Some(tenant_id), "hash-1"))
        .await
        .unwrap();

    assert_eq!(session.customer_id, customer_id);
    assert_eq!(session.tenant_id, Some(tenant_id));

    let fetched = repo.get_by_token_hash("hash-1").await.unwrap();
    assert_eq!(fetched.id, session.id);

    let missing = repo.get_by_token_hash("unknown").await;
    assert!(matches!(missing, Err(CrmError::NotFound { .. })));
}

#[tokio::test]
async fn invalidate_removes_session() {
    let db = setup().await;
    let repo = SurrealSessionRepository::new(db);

    let session = repo
        .create(session_input(Uuid::new_v4(), None, "hash-2"))
        .await
        .unwrap();
    repo.invalidate(session.id).await.unwrap();

    assert!(repo.get_by_token_hash("hash-2").await.is_err());
}

#[tokio::test]
async fn invalidate_customer_sessions_removes_all() {
    let db = setup().await;
    let repo = SurrealSessionRepository::new(db);

    let customer_id = Uuid::new_v4();
    repo.create(session_input(customer_id, None, "hash-3a"))
        .await
        .unwrap();
    repo.create(session_input(customer_id, None, "hash-3b"))
        .await
        .unwrap();
    repo.create(session_input(Uuid::new_v4(), None, "hash-3c"))
        .await
        .unwrap();

    repo.invalidate_customer_sessions(customer_id).await.unwrap();

    assert!(repo.get_by_token_hash("hash-3a").await.is_err());
    assert!(repo.get_by_token_hash("hash-3b").await.is_err());
    // Other customers' sessions survive.
    assert!(repo.get_by_token_hash("hash-3c").await.is_ok());
}

#[tokio::test]
async fn cleanup_expired_sweeps_only_expired() {
    let db = setup().await;
    let repo = SurrealSessionRepository::new(db);

    let mut expired = session_input(Uuid::new_v4(), None, "hash-4a");
    expired.expires_at = Utc::now() - Duration::hours(1);
    repo.create(expired).await.unwrap();
    repo.create(session_input(Uuid::new_v4(), None, "hash-4b"))
        .await
        .unwrap();

    let swept = repo.cleanup_expired().await.unwrap();
    assert_eq!(swept, 1);
    assert!(repo.get_by_token_hash("hash-4a").await.is_err());
    assert!(repo.get_by_token_hash("hash-4b").await.is_ok());
}
