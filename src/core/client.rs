//! Client business logic - CRUD for the people and businesses being billed.
//!
//! Clients are shared between all users; only invoice visibility is scoped. Email
//! addresses are unique among clients when present.

use crate::{
    core::{
        scope::Scope,
        status::{self, outstanding_amount, to_cents},
    },
    entities::{Client, Invoice, Payment, client, invoice, payment},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};
use validator::Validate;

/// Input for creating or updating a client.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ClientInput {
    /// Contact or business name
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Company name
    pub company: Option<String>,
    /// Billing email
    #[validate(email)]
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Tax registration number
    pub tax_id: Option<String>,
}

impl ClientInput {
    /// Input with only the required name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn validated(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        self.email = blank_to_none(self.email).map(|email| email.to_lowercase());
        self.company = blank_to_none(self.company);
        self.phone = blank_to_none(self.phone);
        self.address = blank_to_none(self.address);
        self.tax_id = blank_to_none(self.tax_id);

        if self.name.is_empty() {
            return Err(Error::validation("Name is required"));
        }
        self.validate()?;
        Ok(self)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Invoice count and outstanding balance for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Number of visible invoices for the client
    pub total_invoices: u64,
    /// Unpaid balance over `Sent`, `Overdue` and `Partially Paid` invoices
    pub outstanding: Decimal,
}

async fn ensure_email_free<C>(db: &C, email: Option<&str>, except_id: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(email) = email else {
        return Ok(());
    };

    let mut query = Client::find().filter(client::Column::Email.eq(email));
    if let Some(id) = except_id {
        query = query.filter(client::Column::Id.ne(id));
    }

    if query.one(db).await?.is_some() {
        return Err(Error::Conflict {
            message: "Client with this email already exists".to_string(),
        });
    }
    Ok(())
}

/// Creates a client after validating the name and email.
///
/// # Errors
/// [`Error::Validation`] for a blank name or malformed email, [`Error::Conflict`] when
/// another client already uses the email.
pub async fn create_client(db: &DatabaseConnection, input: ClientInput) -> Result<client::Model> {
    let input = input.validated()?;
    ensure_email_free(db, input.email.as_deref(), None).await?;

    let client = client::ActiveModel {
        name: Set(input.name),
        company: Set(input.company),
        email: Set(input.email),
        phone: Set(input.phone),
        address: Set(input.address),
        tax_id: Set(input.tax_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(client_id = client.id, "Client created");
    Ok(client)
}

/// All clients, ordered alphabetically by name.
pub async fn list_clients(db: &DatabaseConnection) -> Result<Vec<client::Model>> {
    Client::find()
        .order_by_asc(client::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a client by id.
pub async fn get_client(db: &DatabaseConnection, client_id: i64) -> Result<client::Model> {
    Client::find_by_id(client_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "Client",
            id: client_id,
        })
}

/// Replaces every field of an existing client.
pub async fn update_client(
    db: &DatabaseConnection,
    client_id: i64,
    input: ClientInput,
) -> Result<client::Model> {
    let existing = get_client(db, client_id).await?;
    let input = input.validated()?;
    ensure_email_free(db, input.email.as_deref(), Some(client_id)).await?;

    let mut active: client::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.company = Set(input.company);
    active.email = Set(input.email);
    active.phone = Set(input.phone);
    active.address = Set(input.address);
    active.tax_id = Set(input.tax_id);

    let client = active.update(db).await?;
    info!(client_id, "Client updated");
    Ok(client)
}

/// Deletes a client. Its invoices stay, with their client reference cleared.
pub async fn delete_client(db: &DatabaseConnection, client_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let client = Client::find_by_id(client_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Client",
            id: client_id,
        })?;

    let detached = Invoice::update_many()
        .col_expr(invoice::Column::ClientId, Expr::value(Option::<i64>::None))
        .filter(invoice::Column::ClientId.eq(client_id))
        .exec(&txn)
        .await?;
    client.delete(&txn).await?;

    txn.commit().await?;

    info!(
        client_id,
        detached_invoices = detached.rows_affected,
        "Client deleted"
    );
    Ok(())
}

/// Invoice count and outstanding balance for one client, as seen by the scope.
///
/// Overdue invoices are swept first so that the balance reflects reconciled statuses.
#[instrument(skip(db))]
pub async fn client_stats(
    db: &DatabaseConnection,
    scope: &Scope,
    client_id: i64,
) -> Result<ClientStats> {
    get_client(db, client_id).await?;
    status::sweep_overdue(db, scope, status::today()).await?;

    let invoices = Invoice::find()
        .filter(scope.invoice_condition())
        .filter(invoice::Column::ClientId.eq(client_id))
        .all(db)
        .await?;

    let invoice_ids: Vec<i64> = invoices.iter().map(|i| i.id).collect();
    let mut paid_by_invoice: HashMap<i64, Decimal> = HashMap::new();
    for payment in Payment::find()
        .filter(payment::Column::InvoiceId.is_in(invoice_ids))
        .all(db)
        .await?
    {
        *paid_by_invoice.entry(payment.invoice_id).or_default() += payment.amount.amount();
    }

    let outstanding = invoices
        .iter()
        .map(|invoice| {
            let paid = paid_by_invoice
                .get(&invoice.id)
                .copied()
                .unwrap_or_default();
            outstanding_amount(invoice.status, invoice.total.amount(), paid)
        })
        .sum();

    Ok(ClientStats {
        total_invoices: invoices.len() as u64,
        outstanding: to_cents(outstanding),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_client_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_client(&db, ClientInput::named("   ")).await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        let result = create_client(
            &db,
            ClientInput {
                email: Some("not-an-email".to_string()),
                ..ClientInput::named("Acme")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { message: _ })));

        assert!(db.into_transaction_log().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_client_integration() -> Result<()> {
        let db = setup_test_db().await?;

        let client = create_client(
            &db,
            ClientInput {
                company: Some("Acme Pvt Ltd".to_string()),
                email: Some("billing@acme.test".to_string()),
                tax_id: Some("  ".to_string()),
                ..ClientInput::named("  Acme  ")
            },
        )
        .await?;

        assert_eq!(client.name, "Acme");
        assert_eq!(client.company.as_deref(), Some("Acme Pvt Ltd"));
        assert_eq!(client.email.as_deref(), Some("billing@acme.test"));
        assert_eq!(client.tax_id, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_client(
            &db,
            ClientInput {
                email: Some("billing@acme.test".to_string()),
                ..ClientInput::named("Acme")
            },
        )
        .await?;
        let second = create_client(&db, ClientInput::named("Globex")).await?;

        let result = create_client(
            &db,
            ClientInput {
                email: Some("billing@acme.test".to_string()),
                ..ClientInput::named("Acme Again")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { message: _ })));

        // Updating another client onto the same email also conflicts
        let result = update_client(
            &db,
            second.id,
            ClientInput {
                email: Some("billing@acme.test".to_string()),
                ..ClientInput::named("Globex")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { message: _ })));

        // Keeping your own email is fine
        let updated = update_client(
            &db,
            first.id,
            ClientInput {
                email: Some("billing@acme.test".to_string()),
                ..ClientInput::named("Acme Renamed")
            },
        )
        .await?;
        assert_eq!(updated.name, "Acme Renamed");

        Ok(())
    }

    #[tokio::test]
    async fn test_email_compared_case_insensitively() -> Result<()> {
        let db = setup_test_db().await?;
        let client = create_client(
            &db,
            ClientInput {
                email: Some("  Billing@Acme.TEST ".to_string()),
                ..ClientInput::named("Acme")
            },
        )
        .await?;
        assert_eq!(client.email.as_deref(), Some("billing@acme.test"));

        let result = create_client(
            &db,
            ClientInput {
                email: Some("billing@acme.test".to_string()),
                ..ClientInput::named("Acme Again")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { message: _ })));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_clients_ordered_by_name() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_client(&db, "Zeta").await?;
        create_test_client(&db, "Alpha").await?;

        let clients = list_clients(&db).await?;
        let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_client_detaches_invoices() -> Result<()> {
        let (db, scope) = setup_with_scope(Role::Admin).await?;
        let client = create_test_client(&db, "Acme").await?;
        let invoice =
            create_test_invoice(&db, &scope, client.id, dec!(50), days_from_today(5)).await?;

        delete_client(&db, client.id).await?;

        assert!(matches!(
            get_client(&db, client.id).await,
            Err(Error::NotFound {
                entity: "Client",
                id: _
            })
        ));
        let detail = crate::core::invoice::get_invoice(&db, &scope, invoice.id).await?;
        assert_eq!(detail.invoice.client_id, None);
        assert_eq!(detail.client_name, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_client_stats_outstanding() -> Result<()> {
        let (db, scope) = setup_with_scope(Role::Admin).await?;
        let client = create_test_client(&db, "Acme").await?;

        let partial =
            create_test_invoice(&db, &scope, client.id, dec!(100), days_from_today(5)).await?;
        create_test_payment(&db, &scope, partial.id, dec!(40)).await?;
        // Draft, not yet outstanding
        create_test_invoice(&db, &scope, client.id, dec!(70), days_from_today(5)).await?;
        // Past due at creation, fully outstanding
        create_test_invoice(&db, &scope, client.id, dec!(30), days_from_today(-3)).await?;

        let stats = client_stats(&db, &scope, client.id).await?;
        assert_eq!(stats.total_invoices, 3);
        assert_eq!(stats.outstanding, dec!(90));

        Ok(())
    }

    #[tokio::test]
    async fn test_client_stats_partial_payment() -> Result<()> {
        let (db, scope, invoice) = setup_with_invoice(dec!(100), days_from_today(5)).await?;
        create_test_payment(&db, &scope, invoice.id, dec!(40)).await?;

        let stats = client_stats(&db, &scope, invoice.client_id.unwrap()).await?;
        assert_eq!(stats.outstanding, dec!(60));
        assert_eq!(stats.outstanding.to_string(), "60.00");

        Ok(())
    }

    #[tokio::test]
    async fn test_client_stats_scoped_to_accountant() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = create_test_scope(&db, "alice@example.com", Role::Accountant).await?;
        let bob = create_test_scope(&db, "bob@example.com", Role::Accountant).await?;
        let client = create_test_client(&db, "Acme").await?;
        create_test_invoice(&db, &alice, client.id, dec!(10), days_from_today(-1)).await?;
        create_test_invoice(&db, &bob, client.id, dec!(20), days_from_today(-1)).await?;

        let stats = client_stats(&db, &alice, client.id).await?;
        assert_eq!(stats.total_invoices, 1);
        assert_eq!(stats.outstanding, dec!(10));

        assert!(matches!(
            client_stats(&db, &alice, 999).await,
            Err(Error::NotFound {
                entity: "Client",
                id: 999
            })
        ));

        Ok(())
    }
}
