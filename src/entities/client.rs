//! Client entity - A customer that invoices are issued to.
//!
//! Only the name is required. Email, when present, is unique among clients.
//! Deleting a client detaches its invoices instead of removing them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Unique identifier for the client
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contact or business name
    pub name: String,
    /// Company name, if different from the contact
    pub company: Option<String>,
    /// Billing email, lower-cased and unique when set
    #[sea_orm(unique)]
    pub email: Option<String>,
    /// Phone number, free-form
    pub phone: Option<String>,
    /// Postal address, free-form
    pub address: Option<String>,
    /// Tax registration number (GST/VAT id)
    pub tax_id: Option<String>,
}

/// Defines relationships between Client and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One client has many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
