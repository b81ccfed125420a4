//! Dashboard aggregation - read-only rollups over the caller's visible invoices.
//!
//! Everything is computed live: overdue invoices are swept first, then the visible
//! invoices and their payments are loaded once and folded in memory.

use crate::{
    core::{
        scope::Scope,
        status::{self, outstanding_amount, to_cents},
    },
    entities::{Client, Invoice, InvoiceStatus, Payment, PaymentMode, invoice, payment},
    errors::Result,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use serde::Serialize;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
};
use tracing::{debug, instrument};

const TOP_CLIENTS_LIMIT: usize = 3;
const RECENT_ACTIVITY_LIMIT: usize = 5;
const UPCOMING_DUE_DAYS: i64 = 7;

/// Headline totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DashboardStats {
    /// Number of visible invoices
    pub total_invoices: u64,
    /// Sum of every payment on a visible invoice
    pub total_received: Decimal,
    /// Unpaid balance over outstanding statuses
    pub outstanding: Decimal,
    /// Unpaid invoices due within the next week, today included
    pub upcoming_due: u64,
}

/// A client ranked by how much it still owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopClient {
    /// Client id
    pub id: i64,
    /// Client name
    pub name: String,
    /// Visible invoices for the client
    pub total_invoices: u64,
    /// Unpaid balance over outstanding statuses
    pub outstanding: Decimal,
}

/// One event in the recent activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActivityEntry {
    /// An invoice was created
    Invoice {
        /// Invoice id
        id: i64,
        /// `INV-####`
        invoice_no: String,
        /// Billed client, if still attached
        client_name: Option<String>,
        /// Invoice total
        total: Decimal,
        /// Current status
        status: InvoiceStatus,
        /// Due date
        due_date: NaiveDate,
        /// When the invoice was recorded
        created_at: DateTimeUtc,
    },
    /// A payment was recorded
    Payment {
        /// Payment id
        id: i64,
        /// Number of the invoice it pays
        invoice_no: String,
        /// Client of that invoice, if still attached
        client_name: Option<String>,
        /// Amount received
        amount: Decimal,
        /// How it was received
        mode: PaymentMode,
        /// Date received
        date: NaiveDate,
        /// When the payment was recorded
        created_at: DateTimeUtc,
    },
}

impl ActivityEntry {
    /// Timestamp the timeline is ordered by.
    #[must_use]
    pub fn created_at(&self) -> DateTimeUtc {
        match self {
            Self::Invoice { created_at, .. } | Self::Payment { created_at, .. } => *created_at,
        }
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    /// Headline totals
    pub stats: DashboardStats,
    /// Newest invoice and payment events, newest first
    pub recent_activity: Vec<ActivityEntry>,
    /// Clients owing the most
    pub top_clients: Vec<TopClient>,
}

/// Builds the dashboard for the caller's scope.
///
/// Accountants only ever see their own invoices and the payments on them.
#[instrument(skip(db))]
pub async fn get_dashboard(db: &DatabaseConnection, scope: &Scope) -> Result<Dashboard> {
    let today = status::today();
    status::sweep_overdue(db, scope, today).await?;

    let invoices = Invoice::find()
        .filter(scope.invoice_condition())
        .find_also_related(Client)
        .all(db)
        .await?;
    let payments = Payment::find()
        .find_also_related(Invoice)
        .filter(scope.invoice_condition())
        .all(db)
        .await?;

    let mut paid_by_invoice: HashMap<i64, Decimal> = HashMap::new();
    for (payment, _) in &payments {
        *paid_by_invoice.entry(payment.invoice_id).or_default() += payment.amount.amount();
    }
    let paid_on = |invoice: &invoice::Model| {
        paid_by_invoice
            .get(&invoice.id)
            .copied()
            .unwrap_or_default()
    };

    let stats = DashboardStats {
        total_invoices: invoices.len() as u64,
        total_received: to_cents(paid_by_invoice.values().copied().sum()),
        outstanding: to_cents(
            invoices
                .iter()
                .map(|(invoice, _)| {
                    outstanding_amount(invoice.status, invoice.total.amount(), paid_on(invoice))
                })
                .sum(),
        ),
        upcoming_due: invoices
            .iter()
            .filter(|(invoice, _)| is_upcoming(invoice, today))
            .count() as u64,
    };

    let top_clients = rank_clients(
        invoices
            .iter()
            .filter_map(|(invoice, client)| client.as_ref().map(|c| (invoice, c)))
            .map(|(invoice, client)| {
                (
                    client,
                    outstanding_amount(invoice.status, invoice.total.amount(), paid_on(invoice)),
                )
            }),
    );

    let client_names: HashMap<i64, &str> = invoices
        .iter()
        .filter_map(|(invoice, client)| client.as_ref().map(|c| (invoice.id, c.name.as_str())))
        .collect();
    let recent_activity = recent_activity(
        invoices.iter().map(|(invoice, client)| ActivityEntry::Invoice {
            id: invoice.id,
            invoice_no: invoice.invoice_no.clone(),
            client_name: client.as_ref().map(|c| c.name.clone()),
            total: invoice.total.amount(),
            status: invoice.status,
            due_date: invoice.due_date,
            created_at: invoice.created_at,
        }),
        payments
            .iter()
            .filter_map(|(payment, invoice)| invoice.as_ref().map(|i| (payment, i)))
            .map(|(payment, invoice)| payment_entry(payment, invoice, &client_names)),
    );

    debug!(
        total_invoices = stats.total_invoices,
        outstanding = %stats.outstanding,
        "Dashboard computed"
    );

    Ok(Dashboard {
        stats,
        recent_activity,
        top_clients,
    })
}

fn is_upcoming(invoice: &invoice::Model, today: NaiveDate) -> bool {
    invoice.status != InvoiceStatus::Paid
        && invoice.due_date >= today
        && invoice.due_date <= today + Duration::days(UPCOMING_DUE_DAYS)
}

fn payment_entry(
    payment: &payment::Model,
    invoice: &invoice::Model,
    client_names: &HashMap<i64, &str>,
) -> ActivityEntry {
    ActivityEntry::Payment {
        id: payment.id,
        invoice_no: invoice.invoice_no.clone(),
        client_name: client_names.get(&invoice.id).map(|name| (*name).to_string()),
        amount: payment.amount.amount(),
        mode: payment.mode,
        date: payment.date,
        created_at: payment.created_at,
    }
}

/// Groups per-invoice outstanding amounts by client and keeps the largest.
///
/// Ties go to the lower client id.
fn rank_clients<'a>(
    rows: impl Iterator<Item = (&'a crate::entities::client::Model, Decimal)>,
) -> Vec<TopClient> {
    let mut by_client: BTreeMap<i64, TopClient> = BTreeMap::new();
    for (client, outstanding) in rows {
        let entry = by_client.entry(client.id).or_insert_with(|| TopClient {
            id: client.id,
            name: client.name.clone(),
            total_invoices: 0,
            outstanding: Decimal::ZERO,
        });
        entry.total_invoices += 1;
        entry.outstanding += outstanding;
    }

    // BTreeMap yields ascending ids and the sort is stable
    let mut ranked: Vec<TopClient> = by_client.into_values().collect();
    ranked.sort_by_key(|client| Reverse(client.outstanding));
    ranked.truncate(TOP_CLIENTS_LIMIT);
    for client in &mut ranked {
        client.outstanding = to_cents(client.outstanding);
    }
    ranked
}

fn recent_activity(
    invoices: impl Iterator<Item = ActivityEntry>,
    payments: impl Iterator<Item = ActivityEntry>,
) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = invoices.chain(payments).collect();
    entries.sort_by_key(|entry| Reverse(entry.created_at()));
    entries.truncate(RECENT_ACTIVITY_LIMIT);
    entries
}
