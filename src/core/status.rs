//! Invoice status reconciler.
//!
//! The authoritative state machine for [`InvoiceStatus`]. Status is always recomputed
//! from scratch out of the invoice total, its due date and the sum of its current
//! payments, so reconciling is idempotent and independent of the order payments were
//! recorded in.
//!
//! Two entry points write status back to the store:
//! - [`reconcile_invoice_status`] runs after every payment mutation, inside the caller's
//!   transaction.
//! - [`correct_overdue`] / [`sweep_overdue`] apply the read-time overdue correction: a
//!   read of an unpaid invoice past its due date persists `Overdue` before returning.
//!   Reads therefore have a write side effect; the sweep exists so a scheduled job can
//!   take that over.

use crate::{
    core::{scope::Scope, totals::checked_sum},
    entities::{Invoice, InvoiceStatus, Payment, invoice, payment},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument};

impl InvoiceStatus {
    /// Whether an invoice in this status contributes to outstanding balances.
    #[must_use]
    pub const fn counts_as_outstanding(self) -> bool {
        matches!(self, Self::Sent | Self::Overdue | Self::PartiallyPaid)
    }
}

/// The calendar date used for due-date comparisons.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Derives the status an invoice should have from its payment and due-date facts.
///
/// Never yields [`InvoiceStatus::Draft`]: once reconciled, an invoice has left draft.
#[must_use]
pub fn derive_status(
    paid: Decimal,
    total: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InvoiceStatus {
    if paid >= total {
        InvoiceStatus::Paid
    } else if paid > Decimal::ZERO {
        InvoiceStatus::PartiallyPaid
    } else if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Sent
    }
}

/// Status assigned when an invoice is first created.
#[must_use]
pub fn initial_status(due_date: NaiveDate, today: NaiveDate) -> InvoiceStatus {
    if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Draft
    }
}

/// Status after the read-time overdue check: anything not `Paid` whose due date has
/// passed becomes `Overdue`, including drafts.
#[must_use]
pub fn read_time_status(
    current: InvoiceStatus,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InvoiceStatus {
    if current != InvoiceStatus::Paid && due_date < today {
        InvoiceStatus::Overdue
    } else {
        current
    }
}

/// Amount still owed on an invoice, or zero if its status is not an outstanding one.
#[must_use]
pub fn outstanding_amount(status: InvoiceStatus, total: Decimal, paid: Decimal) -> Decimal {
    if status.counts_as_outstanding() {
        total - paid
    } else {
        Decimal::ZERO
    }
}

/// Rescales an amount to two decimal places for reporting, so `60` reads `60.00`.
#[must_use]
pub fn to_cents(mut amount: Decimal) -> Decimal {
    amount.rescale(2);
    amount
}

/// Sum of all payments currently recorded against an invoice.
pub async fn total_paid<C>(db: &C, invoice_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let payments = Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .all(db)
        .await?;
    checked_sum(payments.iter().map(|p| p.amount.amount()))
}

/// Recomputes an invoice's status from its current payments and persists it.
///
/// Generic over the connection so payment mutations can call it inside their own
/// transaction; a failure here must abort that transaction.
///
/// # Errors
/// [`Error::NotFound`] if the invoice no longer exists.
#[instrument(skip(db))]
pub async fn reconcile_invoice_status<C>(db: &C, invoice_id: i64) -> Result<InvoiceStatus>
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

    let paid = total_paid(db, invoice_id).await?;
    let status = derive_status(paid, invoice.total.amount(), invoice.due_date, today());

    if status == invoice.status {
        debug!(%status, %paid, "Invoice status unchanged");
    } else {
        write_status(db, invoice_id, status).await?;
        info!(from = %invoice.status, to = %status, %paid, "Invoice status reconciled");
    }

    Ok(status)
}

/// Applies the read-time overdue check to one invoice, persisting the change if any.
pub async fn correct_overdue<C>(
    db: &C,
    mut invoice: invoice::Model,
    today: NaiveDate,
) -> Result<invoice::Model>
where
    C: ConnectionTrait,
{
    let corrected = read_time_status(invoice.status, invoice.due_date, today);
    if corrected != invoice.status {
        write_status(db, invoice.id, corrected).await?;
        info!(
            invoice_id = invoice.id,
            from = %invoice.status,
            "Invoice past due, marked overdue on read"
        );
        invoice.status = corrected;
    }
    Ok(invoice)
}

/// Marks every visible, unpaid, past-due invoice as `Overdue` in a single statement.
///
/// Returns the number of invoices that changed.
#[instrument(skip(db))]
pub async fn sweep_overdue<C>(db: &C, scope: &Scope, today: NaiveDate) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Invoice::update_many()
        .col_expr(
            invoice::Column::Status,
            Expr::value(InvoiceStatus::Overdue),
        )
        .filter(scope.invoice_condition())
        .filter(invoice::Column::Status.ne(InvoiceStatus::Paid))
        .filter(invoice::Column::Status.ne(InvoiceStatus::Overdue))
        .filter(invoice::Column::DueDate.lt(today))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(count = result.rows_affected, "Marked invoices overdue");
    }
    Ok(result.rows_affected)
}

async fn write_status<C>(db: &C, invoice_id: i64, status: InvoiceStatus) -> Result<()>
where
    C: ConnectionTrait,
{
    Invoice::update_many()
        .col_expr(invoice::Column::Status, Expr::value(status))
        .filter(invoice::Column::Id.eq(invoice_id))
        .exec(db)
        .await?;
    Ok(())
}
