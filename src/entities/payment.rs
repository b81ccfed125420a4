//! Payment entity - Money received against exactly one invoice.
//!
//! Every insert, update or delete of a payment is followed by reconciliation of the
//! owning invoice's status inside the same store transaction.

use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the money was received.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PaymentMode {
    /// Physical cash
    #[sea_orm(string_value = "Cash")]
    Cash,
    /// Unified Payments Interface transfer
    #[sea_orm(string_value = "UPI")]
    #[serde(rename = "UPI")]
    Upi,
    /// Bank transfer
    #[sea_orm(string_value = "Bank")]
    Bank,
}

impl std::str::FromStr for PaymentMode {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash" => Ok(Self::Cash),
            "UPI" => Ok(Self::Upi),
            "Bank" => Ok(Self::Bank),
            _ => Err(crate::errors::Error::validation("Invalid payment mode")),
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cash => "Cash",
            Self::Upi => "UPI",
            Self::Bank => "Bank",
        })
    }
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice this payment settles
    pub invoice_id: i64,
    /// Amount received, strictly positive
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Channel the money arrived through
    pub mode: PaymentMode,
    /// Date the payment was received
    pub date: Date,
    /// When the payment was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one invoice
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
