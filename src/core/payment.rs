//! Payment business logic - Records money received and keeps invoice status in step.
//!
//! Every mutation here follows the same shape: validate the input, open a transaction,
//! check the invoice exists and is visible to the caller, write the payment, reconcile
//! the invoice status, commit. A payment is never committed without its reconciliation:
//! if reconciling fails the transaction is dropped and the write rolls back.

use crate::{
    core::{scope::Scope, status::reconcile_invoice_status},
    entities::{Invoice, InvoiceStatus, Payment, PaymentMode, invoice, payment},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{info, instrument};

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Invoice being paid
    pub invoice_id: i64,
    /// Amount received, must be positive
    pub amount: Decimal,
    /// How it was received
    pub mode: PaymentMode,
    /// When it was received
    pub date: NaiveDate,
}

/// Input for correcting a recorded payment. The invoice cannot change.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    /// Amount received, must be positive
    pub amount: Decimal,
    /// How it was received
    pub mode: PaymentMode,
    /// When it was received
    pub date: NaiveDate,
}

/// A stored payment plus the invoice status it produced.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    /// The payment as stored
    #[serde(flatten)]
    pub payment: payment::Model,
    /// Status of the owning invoice after reconciliation
    pub invoice_status: InvoiceStatus,
}

/// A payment with the number of the invoice it settles.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentListing {
    /// The payment as stored
    #[serde(flatten)]
    pub payment: payment::Model,
    /// `INV-####` of the owning invoice
    pub invoice_no: String,
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be positive"));
    }
    Ok(())
}

async fn find_accessible_invoice<C>(
    db: &C,
    scope: &Scope,
    invoice_id: i64,
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    let invoice = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "Invoice",
            id: invoice_id,
        })?;
    scope.ensure_access(invoice.created_by)?;
    Ok(invoice)
}

async fn find_payment<C>(db: &C, payment_id: i64) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "Payment",
            id: payment_id,
        })
}

/// Records a payment against an invoice and reconciles the invoice status.
///
/// # Errors
/// [`Error::Validation`] for a non-positive amount (before any store access),
/// [`Error::NotFound`] for an unknown invoice, [`Error::AccessDenied`] when an
/// accountant pays someone else's invoice.
#[instrument(skip(db, input), fields(user_id = scope.user_id, invoice_id = input.invoice_id))]
pub async fn create_payment(
    db: &DatabaseConnection,
    scope: &Scope,
    input: NewPayment,
) -> Result<PaymentReceipt> {
    validate_amount(input.amount)?;

    let txn = db.begin().await?;

    find_accessible_invoice(&txn, scope, input.invoice_id).await?;

    let payment = payment::ActiveModel {
        invoice_id: Set(input.invoice_id),
        amount: Set(input.amount.into()),
        mode: Set(input.mode),
        date: Set(input.date),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let invoice_status = reconcile_invoice_status(&txn, input.invoice_id).await?;

    txn.commit().await?;

    info!(
        payment_id = payment.id,
        amount = %payment.amount,
        mode = %payment.mode,
        %invoice_status,
        "Payment recorded"
    );

    Ok(PaymentReceipt {
        payment,
        invoice_status,
    })
}

/// Corrects a payment's amount, mode or date and reconciles the invoice status.
#[instrument(skip(db, input), fields(user_id = scope.user_id))]
pub async fn update_payment(
    db: &DatabaseConnection,
    scope: &Scope,
    payment_id: i64,
    input: PaymentUpdate,
) -> Result<PaymentReceipt> {
    validate_amount(input.amount)?;

    let txn = db.begin().await?;

    let existing = find_payment(&txn, payment_id).await?;
    let invoice_id = existing.invoice_id;
    find_accessible_invoice(&txn, scope, invoice_id).await?;

    let mut active: payment::ActiveModel = existing.into();
    active.amount = Set(input.amount.into());
    active.mode = Set(input.mode);
    active.date = Set(input.date);
    let payment = active.update(&txn).await?;

    let invoice_status = reconcile_invoice_status(&txn, invoice_id).await?;

    txn.commit().await?;

    info!(
        payment_id,
        amount = %payment.amount,
        %invoice_status,
        "Payment updated"
    );

    Ok(PaymentReceipt {
        payment,
        invoice_status,
    })
}

/// Deletes a payment and returns the reconciled status of its invoice.
///
/// This can move an invoice back out of `Paid`.
#[instrument(skip(db), fields(user_id = scope.user_id))]
pub async fn delete_payment(
    db: &DatabaseConnection,
    scope: &Scope,
    payment_id: i64,
) -> Result<InvoiceStatus> {
    let txn = db.begin().await?;

    let payment = find_payment(&txn, payment_id).await?;
    let invoice_id = payment.invoice_id;
    find_accessible_invoice(&txn, scope, invoice_id).await?;

    payment.delete(&txn).await?;

    let invoice_status = reconcile_invoice_status(&txn, invoice_id).await?;

    txn.commit().await?;

    info!(payment_id, invoice_id, %invoice_status, "Payment deleted");
    Ok(invoice_status)
}

/// Payments recorded against one invoice, most recent payment date first.
pub async fn list_payments_for_invoice(
    db: &DatabaseConnection,
    scope: &Scope,
    invoice_id: i64,
) -> Result<Vec<payment::Model>> {
    find_accessible_invoice(db, scope, invoice_id).await?;

    Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .order_by_desc(payment::Column::Date)
        .order_by_desc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every payment in the system with its invoice number. Admin only.
pub async fn list_all_payments(
    db: &DatabaseConnection,
    scope: &Scope,
) -> Result<Vec<PaymentListing>> {
    scope.ensure_admin()?;

    let rows = Payment::find()
        .find_also_related(Invoice)
        .order_by_desc(payment::Column::Date)
        .order_by_desc(payment::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(payment, invoice)| {
            invoice.map(|invoice| PaymentListing {
                payment,
                invoice_no: invoice.invoice_no,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::str::FromStr;

    #[tokio::test]
    async fn test_create_payment_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let scope = Scope::new(1, Role::Admin);

        for amount in [dec!(0), dec!(-5)] {
            let result = create_payment(
                &db,
                &scope,
                NewPayment {
                    invoice_id: 1,
                    amount,
                    mode: PaymentMode::Cash,
                    date: today(),
                },
            )
            .await;
            assert!(matches!(result, Err(Error::Validation { message: _ })));
        }

        assert!(db.into_transaction_log().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_rolled_back_when_reconciliation_fails() -> Result<()> {
        let now = chrono::Utc::now();
        let invoice = invoice::Model {
            id: 1,
            invoice_no: "INV-0001".to_string(),
            client_id: None,
            created_by: 1,
            issue_date: today(),
            due_date: today(),
            tax: Decimal::ZERO.into(),
            discount: Decimal::ZERO.into(),
            total: dec!(100).into(),
            status: InvoiceStatus::Draft,
            created_at: now,
        };
        let payment = payment::Model {
            id: 1,
            invoice_id: 1,
            amount: dec!(40).into(),
            mode: PaymentMode::Cash,
            date: today(),
            created_at: now,
        };
        // Access check finds the invoice, the insert succeeds, then the invoice is gone
        // by the time the reconciler looks it up
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![invoice]])
            .append_exec_results([MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .append_query_results([vec![payment]])
            .append_query_results([Vec::<invoice::Model>::new()])
            .into_connection();

        let result = create_payment(
            &db,
            &Scope::new(1, Role::Admin),
            NewPayment {
                invoice_id: 1,
                amount: dec!(40),
                mode: PaymentMode::Cash,
                date: today(),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Invoice",
                id: 1
            })
        ));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let statements: Vec<&str> = log[0].statements().iter().map(|s| s.sql.as_str()).collect();
        assert!(statements.iter().any(|sql| sql.starts_with("INSERT INTO")));
        assert_eq!(statements.last(), Some(&"ROLLBACK"));
        assert!(!statements.contains(&"COMMIT"));

        Ok(())
    }

    #[test]
    fn test_payment_mode_parsing() {
        assert_eq!(PaymentMode::from_str("Cash").unwrap(), PaymentMode::Cash);
        assert_eq!(PaymentMode::from_str("UPI").unwrap(), PaymentMode::Upi);
        assert_eq!(PaymentMode::from_str("Bank").unwrap(), PaymentMode::Bank);
        assert!(matches!(
            PaymentMode::from_str("Cheque"),
            Err(Error::Validation { message: _ })
        ));
    }

    #[tokio::test]
    async fn test_partial_payment() -> Result<()> {
        let (db, scope, invoice) = setup_with_invoice(dec!(100), days_from_today(10)).await?;

        let receipt = create_test_payment(&db, &scope, invoice.id, dec!(40)).await?;
        assert_eq!(receipt.invoice_status, InvoiceStatus::PartiallyPaid);
        assert_eq!(receipt.payment.amount, dec!(40));
        assert_eq!(receipt.payment.mode, PaymentMode::Cash);

        let stored = Invoice::find_by_id(invoice.id).one(&db).await?.unwrap();
        assert_eq!(stored.status, InvoiceStatus::PartiallyPaid);

        Ok(())
    }

    #[tokio::test]
    async fn test_payments_summing_to_total_mark_paid() -> Result<()> {
        let (db, scope, invoice) = setup_with_invoice(dec!(100), days_from_today(10)).await?;

        create_test_payment(&db, &scope, invoice.id, dec!(33.33)).await?;
        create_test_payment(&db, &scope, invoice.id, dec!(33.33)).await?;
        let receipt = create_test_payment(&db, &scope, invoice.id, dec!(33.34)).await?;
        assert_eq!(receipt.invoice_status, InvoiceStatus::Paid);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_payment_recomputes_status() -> Result<()> {
        let (db, scope, invoice) = setup_with_invoice(dec!(100), days_from_today(10)).await?;
        let receipt = create_test_payment(&db, &scope, invoice.id, dec!(100)).await?;
        assert_eq!(receipt.invoice_status, InvoiceStatus::Paid);

        let updated = update_payment(
            &db,
            &scope,
            receipt.payment.id,
            PaymentUpdate {
                amount: dec!(25),
                mode: PaymentMode::Upi,
                date: today(),
            },
        )
        .await?;
        assert_eq!(updated.invoice_status, InvoiceStatus::PartiallyPaid);
        assert_eq!(updated.payment.mode, PaymentMode::Upi);
        assert_eq!(updated.payment.invoice_id, invoice.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_payment_reverts_to_sent() -> Result<()> {
        let (db, scope, invoice) = setup_with_invoice(dec!(100), days_from_today(10)).await?;
        let receipt = create_test_payment(&db, &scope, invoice.id, dec!(100)).await?;

        let status = delete_payment(&db, &scope, receipt.payment.id).await?;
        assert_eq!(status, InvoiceStatus::Sent);
        assert!(Payment::find_by_id(receipt.payment.id).one(&db).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_payment_on_missing_invoice() -> Result<()> {
        let (db, scope) = setup_with_scope(Role::Admin).await?;

        let result = create_test_payment(&db, &scope, 999, dec!(10)).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Invoice",
                id: 999
            })
        ));
        assert!(Payment::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_accountant_cannot_touch_foreign_payments() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = create_test_scope(&db, "alice@example.com", Role::Accountant).await?;
        let bob = create_test_scope(&db, "bob@example.com", Role::Accountant).await?;
        let client = create_test_client(&db, "Acme").await?;
        let invoice =
            create_test_invoice(&db, &alice, client.id, dec!(100), days_from_today(10)).await?;
        let receipt = create_test_payment(&db, &alice, invoice.id, dec!(10)).await?;

        assert!(matches!(
            create_test_payment(&db, &bob, invoice.id, dec!(10)).await,
            Err(Error::AccessDenied)
        ));
        assert!(matches!(
            delete_payment(&db, &bob, receipt.payment.id).await,
            Err(Error::AccessDenied)
        ));
        assert!(matches!(
            list_payments_for_invoice(&db, &bob, invoice.id).await,
            Err(Error::AccessDenied)
        ));

        // Alice's payment is untouched
        assert_eq!(list_payments_for_invoice(&db, &alice, invoice.id).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_all_payments_admin_only() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_scope(&db, "admin@example.com", Role::Admin).await?;
        let alice = create_test_scope(&db, "alice@example.com", Role::Accountant).await?;
        let client = create_test_client(&db, "Acme").await?;
        let invoice =
            create_test_invoice(&db, &alice, client.id, dec!(100), days_from_today(10)).await?;
        create_test_payment(&db, &alice, invoice.id, dec!(10)).await?;

        assert!(matches!(
            list_all_payments(&db, &alice).await,
            Err(Error::AccessDenied)
        ));

        let listing = list_all_payments(&db, &admin).await?;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].invoice_no, invoice.invoice_no);

        Ok(())
    }
}
