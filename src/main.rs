#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use invoice_desk::{
    auth::{Argon2Hasher, TokenService, users},
    config::{database, settings},
    core::{Scope, dashboard, status},
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the optional config.toml
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Token service; JWT_SECRET is read directly before use, never stored in AppConfig
    let secret = env::var("JWT_SECRET")
        .inspect_err(|e| error!("JWT_SECRET not found: {}", e))
        .map_err(Error::EnvVar)?;
    let tokens = TokenService::new(&secret, app_config.auth.token_ttl_minutes)?;
    info!(?tokens, "Token service ready");

    // 5. Connect and create tables
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 6. Provision configured users
    let seeded = users::seed_users(&db, &Argon2Hasher, &app_config.seed_users)
        .await
        .inspect_err(|e| error!("Failed to seed users: {}", e))?;
    info!(seeded, "User provisioning complete");

    // 7. One-shot overdue sweep, then a summary of the books
    let system = Scope::system();
    let swept = status::sweep_overdue(&db, &system, status::today()).await?;
    let summary = dashboard::get_dashboard(&db, &system).await?;
    info!(
        swept,
        total_invoices = summary.stats.total_invoices,
        total_received = %summary.stats.total_received,
        outstanding = %summary.stats.outstanding,
        upcoming_due = summary.stats.upcoming_due,
        "Maintenance run complete"
    );

    Ok(())
}
