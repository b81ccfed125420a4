//! Invoice business logic - creation, numbering, reads and updates.
//!
//! Totals are computed (and input rejected) before any transaction is opened. Reads
//! apply the read-time overdue correction from [`crate::core::status`] and persist it
//! before returning, so every invoice handed back carries a fresh status.

use crate::{
    core::{
        scope::Scope,
        status::{self, correct_overdue, initial_status},
        totals::{InvoiceTotals, LineItemInput, checked_sum, compute_invoice_totals},
    },
    entities::{
        Client, Invoice, InvoiceItem, InvoiceStatus, Payment, client, invoice, invoice_item,
        payment,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

const INVOICE_NUMBER_PREFIX: &str = "INV-";

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Client being billed; must exist
    pub client_id: i64,
    /// Date of issue
    pub issue_date: NaiveDate,
    /// Payment due date
    pub due_date: NaiveDate,
    /// Tax added to the subtotal
    pub tax: Decimal,
    /// Discount taken off the subtotal
    pub discount: Decimal,
    /// Billed lines, at least one
    pub items: Vec<LineItemInput>,
}

/// Input for replacing an invoice's contents.
///
/// Items are replaced wholesale. `status` lets the caller move an invoice along
/// manually (e.g. `Draft` to `Sent`); when `None` the current status is kept.
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    /// New client, or `None` to leave the invoice without one
    pub client_id: Option<i64>,
    /// Date of issue
    pub issue_date: NaiveDate,
    /// Payment due date
    pub due_date: NaiveDate,
    /// Tax added to the subtotal
    pub tax: Decimal,
    /// Discount taken off the subtotal
    pub discount: Decimal,
    /// Replacement lines, at least one
    pub items: Vec<LineItemInput>,
    /// Explicit status override
    pub status: Option<InvoiceStatus>,
}

/// An invoice as listed, with its client's name.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    /// Stored invoice, status already corrected
    #[serde(flatten)]
    pub invoice: invoice::Model,
    /// Name of the client, `None` if detached
    pub client_name: Option<String>,
}

/// A single invoice with everything needed to render it.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    /// Stored invoice, status already corrected
    #[serde(flatten)]
    pub invoice: invoice::Model,
    /// Name of the client, `None` if detached
    pub client_name: Option<String>,
    /// Line items in insertion order
    pub items: Vec<invoice_item::Model>,
    /// Sum of line totals
    pub subtotal: Decimal,
    /// Sum of recorded payments
    pub amount_paid: Decimal,
}

/// Formats a sequence number as `INV-####`.
#[must_use]
pub fn format_invoice_number(sequence: u64) -> String {
    format!("{INVOICE_NUMBER_PREFIX}{sequence:04}")
}

/// Extracts the sequence number from an `INV-####` string.
#[must_use]
pub fn parse_invoice_number(invoice_no: &str) -> Option<u64> {
    invoice_no
        .strip_prefix(INVOICE_NUMBER_PREFIX)?
        .parse()
        .ok()
}

/// Picks the number for the next invoice: the invoice count plus one, bumped past the
/// most recent number so that numbers keep increasing after deletions.
///
/// Not race-safe on its own; run it inside the transaction that inserts the invoice.
pub async fn next_invoice_number<C>(db: &C) -> Result<String>
where
    C: ConnectionTrait,
{
    let count = Invoice::find().count(db).await?;
    let latest = Invoice::find()
        .order_by_desc(invoice::Column::Id)
        .one(db)
        .await?
        .and_then(|latest| parse_invoice_number(&latest.invoice_no))
        .unwrap_or(0);

    Ok(format_invoice_number(count.max(latest) + 1))
}

/// Creates an invoice with its line items.
///
/// Items are validated and totalled before the store is touched. Initial status is
/// `Overdue` if the due date has already passed, `Draft` otherwise.
#[instrument(skip(db, input), fields(user_id = scope.user_id))]
pub async fn create_invoice(
    db: &DatabaseConnection,
    scope: &Scope,
    input: NewInvoice,
) -> Result<InvoiceDetail> {
    let totals = compute_invoice_totals(&input.items, input.tax, input.discount)?;

    // Use a transaction so the invoice never exists without its items
    let txn = db.begin().await?;

    let client = find_client(&txn, input.client_id).await?;
    let invoice_no = next_invoice_number(&txn).await?;

    let invoice = invoice::ActiveModel {
        invoice_no: Set(invoice_no),
        client_id: Set(Some(client.id)),
        created_by: Set(scope.user_id),
        issue_date: Set(input.issue_date),
        due_date: Set(input.due_date),
        tax: Set(input.tax.into()),
        discount: Set(input.discount.into()),
        total: Set(totals.total.into()),
        status: Set(initial_status(input.due_date, status::today())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let items = insert_items(&txn, invoice.id, &input.items).await?;

    txn.commit().await?;

    info!(
        invoice_id = invoice.id,
        invoice_no = %invoice.invoice_no,
        total = %invoice.total,
        status = %invoice.status,
        "Invoice created"
    );

    Ok(InvoiceDetail {
        invoice,
        client_name: Some(client.name),
        items,
        subtotal: totals.subtotal,
        amount_paid: Decimal::ZERO,
    })
}

/// Lists every invoice visible to the scope, oldest first, with client names.
///
/// Each unpaid invoice past its due date is persisted as `Overdue` before it is returned.
pub async fn list_invoices(db: &DatabaseConnection, scope: &Scope) -> Result<Vec<InvoiceSummary>> {
    let rows = Invoice::find()
        .filter(scope.invoice_condition())
        .order_by_asc(invoice::Column::Id)
        .find_also_related(Client)
        .all(db)
        .await?;

    let today = status::today();
    let mut summaries = Vec::with_capacity(rows.len());
    for (invoice, client) in rows {
        let invoice = correct_overdue(db, invoice, today).await?;
        summaries.push(InvoiceSummary {
            invoice,
            client_name: client.map(|c| c.name),
        });
    }

    debug!(count = summaries.len(), "Listed invoices");
    Ok(summaries)
}

/// Fetches one invoice with its items, applying the read-time overdue correction.
///
/// # Errors
/// [`Error::NotFound`] for an unknown id, [`Error::AccessDenied`] when an accountant
/// asks for someone else's invoice.
pub async fn get_invoice(
    db: &DatabaseConnection,
    scope: &Scope,
    invoice_id: i64,
) -> Result<InvoiceDetail> {
    let (invoice, client) = Invoice::find_by_id(invoice_id)
        .find_also_related(Client)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "Invoice",
            id: invoice_id,
        })?;
    scope.ensure_access(invoice.created_by)?;

    let items = items_for_invoice(db, invoice_id).await?;
    let amount_paid = status::total_paid(db, invoice_id).await?;
    let invoice = correct_overdue(db, invoice, status::today()).await?;

    Ok(InvoiceDetail {
        invoice,
        client_name: client.map(|c| c.name),
        subtotal: checked_sum(items.iter().map(|item| item.line_total.amount()))?,
        items,
        amount_paid,
    })
}

/// Line items of an invoice in insertion order.
pub async fn items_for_invoice<C>(db: &C, invoice_id: i64) -> Result<Vec<invoice_item::Model>>
where
    C: ConnectionTrait,
{
    InvoiceItem::find()
        .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces an invoice's dates, amounts and items.
///
/// Items are deleted and re-inserted, and the total recomputed. If payments already
/// exist the status is reconciled against the new total, overriding `input.status`.
#[instrument(skip(db, input), fields(user_id = scope.user_id))]
pub async fn update_invoice(
    db: &DatabaseConnection,
    scope: &Scope,
    invoice_id: i64,
    input: UpdateInvoice,
) -> Result<InvoiceDetail> {
    let InvoiceTotals { subtotal, total } =
        compute_invoice_totals(&input.items, input.tax, input.discount)?;

    let txn = db.begin().await?;

    let existing = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Invoice",
            id: invoice_id,
        })?;
    scope.ensure_access(existing.created_by)?;

    let client = match input.client_id {
        Some(client_id) => Some(find_client(&txn, client_id).await?),
        None => None,
    };

    let current_status = existing.status;
    let mut active: invoice::ActiveModel = existing.into();
    active.client_id = Set(client.as_ref().map(|c| c.id));
    active.issue_date = Set(input.issue_date);
    active.due_date = Set(input.due_date);
    active.tax = Set(input.tax.into());
    active.discount = Set(input.discount.into());
    active.total = Set(total.into());
    active.status = Set(input.status.unwrap_or(current_status));
    let mut invoice = active.update(&txn).await?;

    InvoiceItem::delete_many()
        .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;
    let items = insert_items(&txn, invoice_id, &input.items).await?;

    // Payments are strictly positive, so any recorded payment makes this non-zero
    let amount_paid = status::total_paid(&txn, invoice_id).await?;
    if amount_paid > Decimal::ZERO {
        invoice.status = status::reconcile_invoice_status(&txn, invoice_id).await?;
    }

    txn.commit().await?;

    info!(
        invoice_id,
        total = %invoice.total,
        status = %invoice.status,
        "Invoice updated"
    );

    Ok(InvoiceDetail {
        invoice,
        client_name: client.map(|c| c.name),
        items,
        subtotal,
        amount_paid,
    })
}

/// Deletes an invoice together with its items and payments.
pub async fn delete_invoice(db: &DatabaseConnection, scope: &Scope, invoice_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let invoice = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Invoice",
            id: invoice_id,
        })?;
    scope.ensure_access(invoice.created_by)?;

    InvoiceItem::delete_many()
        .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;
    Payment::delete_many()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;
    invoice.delete(&txn).await?;

    txn.commit().await?;

    info!(invoice_id, "Invoice deleted");
    Ok(())
}

async fn find_client<C>(db: &C, client_id: i64) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    Client::find_by_id(client_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "Client",
            id: client_id,
        })
}

async fn insert_items<C>(
    db: &C,
    invoice_id: i64,
    items: &[LineItemInput],
) -> Result<Vec<invoice_item::Model>>
where
    C: ConnectionTrait,
{
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let model = invoice_item::ActiveModel {
            invoice_id: Set(invoice_id),
            description: Set(item.description.trim().to_string()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price.into()),
            line_total: Set(item.line_total()?.into()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted.push(model);
    }
    Ok(inserted)
}
