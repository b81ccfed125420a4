//! Invoice item entity - One billed line on an invoice.
//!
//! Items are exclusively owned by their invoice and replaced wholesale whenever the
//! invoice is updated.

use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning invoice
    pub invoice_id: i64,
    /// What was sold
    pub description: String,
    /// Units billed, at least 1
    pub quantity: i32,
    /// Price per unit, never negative
    #[sea_orm(column_type = "Text")]
    pub unit_price: Money,
    /// `quantity * unit_price`
    #[sea_orm(column_type = "Text")]
    pub line_total: Money,
}

/// Defines relationships between `InvoiceItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
