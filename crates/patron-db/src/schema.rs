//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Monetary fields are decimals,
//! never floats, so in-query aggregate arithmetic stays exact.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string \
    ASSERT $value = string::lowercase($value);
DEFINE FIELD business_email ON TABLE tenant TYPE string;
DEFINE FIELD business_phone ON TABLE tenant TYPE string DEFAULT '';
DEFINE FIELD currency_code ON TABLE tenant TYPE string DEFAULT 'USD';
DEFINE FIELD currency_symbol ON TABLE tenant TYPE string DEFAULT '$';
DEFINE FIELD currency_position ON TABLE tenant TYPE string \
    ASSERT $value IN ['Before', 'After'] DEFAULT 'Before';
DEFINE FIELD currency_decimal_places ON TABLE tenant TYPE int DEFAULT 2;
DEFINE FIELD primary_color ON TABLE tenant TYPE string \
    DEFAULT '#228B22';
DEFINE FIELD secondary_color ON TABLE tenant TYPE string \
    DEFAULT '#FF8C00';
DEFINE FIELD logo_url ON TABLE tenant TYPE option<string>;
DEFINE FIELD subscription_status ON TABLE tenant TYPE string \
    ASSERT $value IN ['Trial', 'Active', 'PastDue', 'Suspended', \
    'Cancelled'] DEFAULT 'Trial';
DEFINE FIELD trial_ends_at ON TABLE tenant TYPE option<datetime>;
DEFINE FIELD max_customers ON TABLE tenant TYPE int DEFAULT 100;
DEFINE FIELD max_staff ON TABLE tenant TYPE int DEFAULT 3;
DEFINE FIELD owner_id ON TABLE tenant TYPE string;
DEFINE FIELD is_active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Tenant settings (one-to-one with tenant)
-- =======================================================================
DEFINE TABLE tenant_settings SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_settings TYPE string;
DEFINE FIELD allow_customer_registration ON TABLE tenant_settings \
    TYPE bool DEFAULT true;
DEFINE FIELD require_email_verification ON TABLE tenant_settings \
    TYPE bool DEFAULT false;
DEFINE FIELD loyalty_enabled ON TABLE tenant_settings TYPE bool \
    DEFAULT true;
DEFINE FIELD points_per_currency_unit ON TABLE tenant_settings \
    TYPE decimal DEFAULT 1dec;
DEFINE FIELD enable_email_notifications ON TABLE tenant_settings \
    TYPE bool DEFAULT true;
DEFINE FIELD enable_push_notifications ON TABLE tenant_settings \
    TYPE bool DEFAULT true;
DEFINE FIELD enable_sms_notifications ON TABLE tenant_settings \
    TYPE bool DEFAULT false;
DEFINE FIELD business_hours ON TABLE tenant_settings TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE tenant_settings TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant_settings TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_settings_tenant ON TABLE tenant_settings \
    COLUMNS tenant_id UNIQUE;

-- =======================================================================
-- Customers (global scope, keyed by email)
-- =======================================================================
DEFINE TABLE customer SCHEMAFULL;
DEFINE FIELD email ON TABLE customer TYPE string \
    ASSERT string::is_email($value);
DEFINE FIELD first_name ON TABLE customer TYPE string;
DEFINE FIELD last_name ON TABLE customer TYPE string;
DEFINE FIELD phone ON TABLE customer TYPE string DEFAULT '';
DEFINE FIELD password_hash ON TABLE customer TYPE string;
DEFINE FIELD is_active ON TABLE customer TYPE bool DEFAULT true;
DEFINE FIELD is_superuser ON TABLE customer TYPE bool DEFAULT false;
DEFINE FIELD joined_at ON TABLE customer TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE customer TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_customer_email ON TABLE customer COLUMNS email UNIQUE;

-- =======================================================================
-- Memberships (tenant scope, one per customer per tenant)
-- =======================================================================
DEFINE TABLE membership SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE membership TYPE string;
DEFINE FIELD customer_id ON TABLE membership TYPE string;
DEFINE FIELD role ON TABLE membership TYPE string \
    ASSERT $value IN ['Owner', 'Admin', 'Manager', 'Staff', 'Customer'];
DEFINE FIELD loyalty_points ON TABLE membership TYPE int \
    ASSERT $value >= 0 DEFAULT 0;
DEFINE FIELD total_purchases ON TABLE membership TYPE decimal \
    DEFAULT 0dec;
DEFINE FIELD purchase_count ON TABLE membership TYPE int DEFAULT 0;
DEFINE FIELD last_purchase_at ON TABLE membership \
    TYPE option<datetime>;
DEFINE FIELD is_vip ON TABLE membership TYPE bool DEFAULT false;
DEFINE FIELD is_active ON TABLE membership TYPE bool DEFAULT true;
DEFINE FIELD email_notifications ON TABLE membership TYPE bool \
    DEFAULT true;
DEFINE FIELD sms_notifications ON TABLE membership TYPE bool \
    DEFAULT false;
DEFINE FIELD push_notifications ON TABLE membership TYPE bool \
    DEFAULT true;
DEFINE FIELD notes ON TABLE membership TYPE string DEFAULT '';
DEFINE FIELD tags ON TABLE membership TYPE array DEFAULT [];
DEFINE FIELD tags.* ON TABLE membership TYPE string;
DEFINE FIELD joined_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_membership_tenant_customer ON TABLE membership \
    COLUMNS tenant_id, customer_id UNIQUE;
DEFINE INDEX idx_membership_tenant ON TABLE membership \
    COLUMNS tenant_id;

-- =======================================================================
-- Transactions (tenant scope, append-only ledger)
-- =======================================================================
DEFINE TABLE transaction SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE transaction TYPE string;
DEFINE FIELD membership_id ON TABLE transaction TYPE string;
DEFINE FIELD kind ON TABLE transaction TYPE string \
    ASSERT $value IN ['Purchase', 'Refund', 'Adjustment'];
DEFINE FIELD status ON TABLE transaction TYPE string \
    ASSERT $value IN ['Completed', 'Pending', 'Cancelled', 'Refunded'];
DEFINE FIELD amount ON TABLE transaction TYPE decimal;
DEFINE FIELD tax ON TABLE transaction TYPE decimal DEFAULT 0dec;
DEFINE FIELD total ON TABLE transaction TYPE decimal;
DEFINE FIELD payment_method ON TABLE transaction TYPE string \
    ASSERT $value IN ['Cash', 'Card', 'Mobile', 'Other'];
DEFINE FIELD points_earned ON TABLE transaction TYPE int DEFAULT 0;
DEFINE FIELD points_redeemed ON TABLE transaction TYPE int DEFAULT 0;
DEFINE FIELD code ON TABLE transaction TYPE string;
DEFINE FIELD description ON TABLE transaction TYPE string DEFAULT '';
DEFINE FIELD processed_by ON TABLE transaction TYPE option<string>;
DEFINE FIELD occurred_at ON TABLE transaction TYPE datetime;
DEFINE FIELD created_at ON TABLE transaction TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_transaction_tenant_code ON TABLE transaction \
    COLUMNS tenant_id, code UNIQUE;
DEFINE INDEX idx_transaction_membership ON TABLE transaction \
    COLUMNS tenant_id, membership_id;

-- =======================================================================
-- Rewards (tenant scope, loyalty catalog)
-- =======================================================================
DEFINE TABLE reward SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE reward TYPE string;
DEFINE FIELD name ON TABLE reward TYPE string;
DEFINE FIELD description ON TABLE reward TYPE string DEFAULT '';
DEFINE FIELD kind ON TABLE reward TYPE string \
    ASSERT $value IN ['Discount', 'Product', 'Gift', 'Upgrade'];
DEFINE FIELD points_required ON TABLE reward TYPE int \
    ASSERT $value > 0;
DEFINE FIELD discount_kind ON TABLE reward TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Percentage', 'Fixed'];
DEFINE FIELD discount_value ON TABLE reward TYPE decimal DEFAULT 0dec;
DEFINE FIELD minimum_purchase ON TABLE reward TYPE decimal \
    DEFAULT 0dec;
DEFINE FIELD has_stock_limit ON TABLE reward TYPE bool DEFAULT false;
DEFINE FIELD total_stock ON TABLE reward TYPE int DEFAULT 0;
DEFINE FIELD redeemed_count ON TABLE reward TYPE int DEFAULT 0;
DEFINE FIELD has_expiration ON TABLE reward TYPE bool DEFAULT false;
DEFINE FIELD expires_at ON TABLE reward TYPE option<datetime>;
DEFINE FIELD limit_per_customer ON TABLE reward TYPE int DEFAULT 0;
DEFINE FIELD validity_days ON TABLE reward TYPE int DEFAULT 30;
DEFINE FIELD status ON TABLE reward TYPE string \
    ASSERT $value IN ['Active', 'Inactive', 'Expired', 'OutOfStock'] \
    DEFAULT 'Active';
DEFINE FIELD is_featured ON TABLE reward TYPE bool DEFAULT false;
DEFINE FIELD display_order ON TABLE reward TYPE int DEFAULT 0;
DEFINE FIELD created_by ON TABLE reward TYPE option<string>;
DEFINE FIELD created_at ON TABLE reward TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE reward TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_reward_tenant ON TABLE reward COLUMNS tenant_id;

-- =======================================================================
-- Redemptions (tenant scope)
-- =======================================================================
DEFINE TABLE redemption SCHEMAFULL;
DEFINE FIELD code ON TABLE redemption TYPE string;
DEFINE FIELD tenant_id ON TABLE redemption TYPE string;
DEFINE FIELD reward_id ON TABLE redemption TYPE string;
DEFINE FIELD membership_id ON TABLE redemption TYPE string;
DEFINE FIELD points_spent ON TABLE redemption TYPE int;
DEFINE FIELD status ON TABLE redemption TYPE string \
    ASSERT $value IN ['Pending', 'Approved', 'Used', 'Expired', \
    'Cancelled', 'Rejected'];
DEFINE FIELD valid_from ON TABLE redemption TYPE datetime;
DEFINE FIELD valid_until ON TABLE redemption TYPE option<datetime>;
DEFINE FIELD used_at ON TABLE redemption TYPE option<datetime>;
DEFINE FIELD used_by ON TABLE redemption TYPE option<string>;
DEFINE FIELD transaction_id ON TABLE redemption TYPE option<string>;
DEFINE FIELD rejection_reason ON TABLE redemption TYPE string \
    DEFAULT '';
DEFINE FIELD redeemed_at ON TABLE redemption TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE redemption TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_redemption_tenant_code ON TABLE redemption \
    COLUMNS tenant_id, code UNIQUE;
DEFINE INDEX idx_redemption_membership ON TABLE redemption \
    COLUMNS tenant_id, membership_id;
DEFINE INDEX idx_redemption_reward_member ON TABLE redemption \
    COLUMNS tenant_id, reward_id, membership_id;

-- =======================================================================
-- Notifications (tenant scope)
-- =======================================================================
DEFINE TABLE notification SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE notification TYPE string;
DEFINE FIELD created_by ON TABLE notification TYPE option<string>;
DEFINE FIELD title ON TABLE notification TYPE string;
DEFINE FIELD message ON TABLE notification TYPE string;
DEFINE FIELD category ON TABLE notification TYPE string \
    ASSERT $value IN ['Promotion', 'Announcement', 'Birthday', \
    'Reminder', 'Alert', 'Update', 'Other'];
DEFINE FIELD priority ON TABLE notification TYPE string \
    ASSERT $value IN ['Low', 'Normal', 'High', 'Urgent'];
DEFINE FIELD target ON TABLE notification TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD status ON TABLE notification TYPE string \
    ASSERT $value IN ['Draft', 'Scheduled', 'Sending', 'Sent', \
    'Failed'] DEFAULT 'Draft';
DEFINE FIELD scheduled_for ON TABLE notification TYPE option<datetime>;
DEFINE FIELD sent_at ON TABLE notification TYPE option<datetime>;
DEFINE FIELD total_recipients ON TABLE notification TYPE int DEFAULT 0;
DEFINE FIELD total_delivered ON TABLE notification TYPE int DEFAULT 0;
DEFINE FIELD total_read ON TABLE notification TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE notification TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE notification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_notification_tenant ON TABLE notification \
    COLUMNS tenant_id;
DEFINE INDEX idx_notification_status ON TABLE notification \
    COLUMNS tenant_id, status;

-- =======================================================================
-- Notification recipients (one per notification/membership pair)
-- =======================================================================
DEFINE TABLE notification_recipient SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE notification_recipient TYPE string;
DEFINE FIELD notification_id ON TABLE notification_recipient \
    TYPE string;
DEFINE FIELD membership_id ON TABLE notification_recipient TYPE string;
DEFINE FIELD delivery_status ON TABLE notification_recipient \
    TYPE string ASSERT $value IN ['Pending', 'Delivered', 'Failed'] \
    DEFAULT 'Pending';
DEFINE FIELD delivered_at ON TABLE notification_recipient \
    TYPE option<datetime>;
DEFINE FIELD is_read ON TABLE notification_recipient TYPE bool \
    DEFAULT false;
DEFINE FIELD read_at ON TABLE notification_recipient \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE notification_recipient TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_recipient_pair ON TABLE notification_recipient \
    COLUMNS notification_id, membership_id UNIQUE;
DEFINE INDEX idx_recipient_membership ON TABLE notification_recipient \
    COLUMNS tenant_id, membership_id;

-- =======================================================================
-- Sessions (global scope; tenant binding on the row)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD customer_id ON TABLE session TYPE string;
DEFINE FIELD tenant_id ON TABLE session TYPE option<string>;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_customer ON TABLE session \
    COLUMNS customer_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
