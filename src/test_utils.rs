//! Shared test utilities for `InvoiceDesk`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    auth::password::CredentialHasher,
    core::{
        invoice::{self, NewInvoice},
        payment::{self, NewPayment, PaymentReceipt},
        scope::Scope,
        totals::LineItemInput,
    },
    entities::{self, PaymentMode, Role},
    errors::Result,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub use crate::core::status::today;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Inserts a user directly and returns its scope.
///
/// # Defaults
/// * `name`: the local part of the email
/// * `password_hash`: a placeholder, not a valid PHC string
pub async fn create_test_scope(db: &DatabaseConnection, email: &str, role: Role) -> Result<Scope> {
    let name = email.split('@').next().unwrap_or(email).to_string();
    let user = entities::user::ActiveModel {
        name: Set(name),
        email: Set(email.to_string()),
        password_hash: Set("plain:unused".to_string()),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(Scope::new(user.id, role))
}

/// Fresh database plus one user with the given role.
pub async fn setup_with_scope(role: Role) -> Result<(DatabaseConnection, Scope)> {
    let db = setup_test_db().await?;
    let scope = create_test_scope(&db, "user@example.com", role).await?;
    Ok((db, scope))
}

/// Creates a client with only a name.
pub async fn create_test_client(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::client::Model> {
    let client = entities::client::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(client)
}

/// Creates an invoice through the normal creation path.
///
/// # Defaults
/// * one line item, quantity 1, priced at `total`
/// * tax and discount: 0
/// * `issue_date`: today
pub async fn create_test_invoice(
    db: &DatabaseConnection,
    scope: &Scope,
    client_id: i64,
    total: Decimal,
    due_date: NaiveDate,
) -> Result<entities::invoice::Model> {
    let detail = invoice::create_invoice(
        db,
        scope,
        NewInvoice {
            client_id,
            issue_date: today(),
            due_date,
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            items: vec![LineItemInput::new("Services", 1, total)],
        },
    )
    .await?;
    Ok(detail.invoice)
}

/// Records a cash payment dated today.
pub async fn create_test_payment(
    db: &DatabaseConnection,
    scope: &Scope,
    invoice_id: i64,
    amount: Decimal,
) -> Result<PaymentReceipt> {
    payment::create_payment(
        db,
        scope,
        NewPayment {
            invoice_id,
            amount,
            mode: PaymentMode::Cash,
            date: today(),
        },
    )
    .await
}

/// Fresh database with an admin, a client, and one invoice for that client.
pub async fn setup_with_invoice(
    total: Decimal,
    due_date: NaiveDate,
) -> Result<(DatabaseConnection, Scope, entities::invoice::Model)> {
    let (db, scope) = setup_with_scope(Role::Admin).await?;
    let client = create_test_client(&db, "Test Client").await?;
    let invoice = create_test_invoice(&db, &scope, client.id, total, due_date).await?;
    Ok((db, scope, invoice))
}

/// Today shifted by `days` (negative for the past).
pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

/// Reversible stand-in for Argon2 so auth tests stay fast.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }
}
