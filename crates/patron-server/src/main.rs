//! PATRON Server — application entry point.

use patron_db::{DbConfig, DbManager};
use tracing_subscriber::EnvFilter;

fn db_config_from_env() -> DbConfig {
    let defaults = DbConfig::default();
    DbConfig {
        url: std::env::var("PATRON_DB_URL").unwrap_or(defaults.url),
        namespace: std::env::var("PATRON_DB_NAMESPACE").unwrap_or(defaults.namespace),
        database: std::env::var("PATRON_DB_NAME").unwrap_or(defaults.database),
        username: std::env::var("PATRON_DB_USER").unwrap_or(defaults.username),
        password: std::env::var("PATRON_DB_PASSWORD").unwrap_or(defaults.password),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("patron=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting PATRON server...");

    let config = db_config_from_env();
    let manager = match DbManager::connect(&config).await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "database connection failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = patron_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "migrations failed");
        std::process::exit(1);
    }

    tracing::info!("Database ready.");

    // TODO: Start HTTP API server (tenant-resolution middleware, auth
    //       and loyalty handlers)
    // TODO: Start periodic jobs (scheduled notification sends,
    //       redemption expiry, session cleanup)

    tracing::info!("PATRON server stopped.");
}
