//! Invoice entity - The billable document and its derived status.
//!
//! Each invoice carries a generated `INV-####` number, an optional client reference
//! (cleared when the client is deleted), the creating user, dates, tax, discount,
//! the computed `total`, and a `status` maintained by the reconciler in
//! [`crate::core::status`].

use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an invoice.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum InvoiceStatus {
    /// Freshly created, not yet touched by a payment or overdue check
    #[sea_orm(string_value = "Draft")]
    Draft,
    /// Issued, unpaid, not past due
    #[sea_orm(string_value = "Sent")]
    Sent,
    /// Some payment recorded, less than the total
    #[sea_orm(string_value = "Partially Paid")]
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    /// Payments cover the total
    #[sea_orm(string_value = "Paid")]
    Paid,
    /// Unpaid and past its due date
    #[sea_orm(string_value = "Overdue")]
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::PartiallyPaid => "Partially Paid",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
        };
        f.write_str(label)
    }
}

/// Invoice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable number, e.g. `INV-0042`
    #[sea_orm(unique)]
    pub invoice_no: String,
    /// Billed client; `None` once the client has been deleted
    pub client_id: Option<i64>,
    /// User who created the invoice; drives accountant visibility
    pub created_by: i64,
    /// Date the invoice was issued
    pub issue_date: Date,
    /// Date payment is due
    pub due_date: Date,
    /// Tax added on top of the item subtotal
    #[sea_orm(column_type = "Text")]
    pub tax: Money,
    /// Discount subtracted from the item subtotal
    #[sea_orm(column_type = "Text")]
    pub discount: Money,
    /// `subtotal + tax - discount`
    #[sea_orm(column_type = "Text")]
    pub total: Money,
    /// Current lifecycle status
    pub status: InvoiceStatus,
    /// When the invoice was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invoice optionally belongs to one client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id",
        on_delete = "SetNull"
    )]
    Client,
    /// Each invoice is created by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
    /// One invoice has many line items
    #[sea_orm(has_many = "super::invoice_item::Entity")]
    Items,
    /// One invoice has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::invoice_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
