//! SurrealDB implementation of [`CustomerRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use patron_core::error::CrmResult;
use patron_core::models::customer::{CreateCustomer, Customer, UpdateCustomer};
use patron_core::repository::CustomerRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::convert::parse_uuid;

const CUSTOMER_FIELDS: &str = "\
    meta::id(id) AS record_id, email, first_name, last_name, phone, \
    password_hash, is_active, is_superuser, joined_at, updated_at";

#[derive(Debug, SurrealValue)]
struct CustomerRow {
    record_id: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    password_hash: String,
    is_active: bool,
    is_superuser: bool,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CustomerRow {
    fn try_into_customer(self) -> Result<Customer, DbError> {
        Ok(Customer {
            id: parse_uuid("customer", &self.record_id)?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            joined_at: self.joined_at,
            updated_at: self.updated_at,
        })
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Query(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Query(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
///
/// Public for use by the auth layer.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Query(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Query(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the customer repository.
#[derive(Clone)]
pub struct SurrealCustomerRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealCustomerRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Customer, DbError> {
        let query = format!(
            "SELECT {CUSTOMER_FIELDS} FROM type::record('customer', $id)"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CustomerRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "customer".into(),
            id: id.to_string(),
        })?;
        row.try_into_customer()
    }
}

impl<C: Connection> CustomerRepository for SurrealCustomerRepository<C> {
    async fn create(&self, input: CreateCustomer) -> CrmResult<Customer> {
        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('customer', $id) SET \
                 email = string::lowercase($email), \
                 first_name = $first_name, last_name = $last_name, \
                 phone = $phone, password_hash = $password_hash \
                 RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("email", input.email))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("phone", input.phone.unwrap_or_default()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::classify(e, "customer"))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CrmResult<Customer> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn get_by_email(&self, email: &str) -> CrmResult<Customer> {
        let query = format!(
            "SELECT {CUSTOMER_FIELDS} FROM customer \
             WHERE email = string::lowercase($email)"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CustomerRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "customer".into(),
            id: format!("email={email}"),
        })?;
        Ok(row.try_into_customer()?)
    }

    async fn update(&self, id: Uuid, input: UpdateCustomer) -> CrmResult<Customer> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('customer', $id) SET {} RETURN NONE",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::classify(e, "customer"))?;

        Ok(self.fetch(&id_str).await?)
    }

    async fn set_password(&self, id: Uuid, raw_password: &str) -> CrmResult<()> {
        let password_hash = hash_password(raw_password, self.pepper.as_deref())?;

        self.db
            .query(
                "UPDATE type::record('customer', $id) SET \
                 password_hash = $password_hash, \
                 updated_at = time::now() RETURN NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> CrmResult<()> {
        self.db
            .query(
                "UPDATE type::record('customer', $id) SET \
                 is_active = false, updated_at = time::now() RETURN NONE",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
