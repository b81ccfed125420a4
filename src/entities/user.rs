//! User entity - Represents an authenticated operator of the system.
//!
//! Each user has a unique email, a hashed credential, and a role that decides how much
//! of the record store they can see.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of roles. Admins see every record, accountants only their own.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unrestricted visibility
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Sees only records they created
    #[sea_orm(string_value = "accountant")]
    Accountant,
}

impl std::str::FromStr for Role {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "accountant" => Ok(Self::Accountant),
            _ => Err(crate::errors::Error::validation("Invalid role")),
        }
    }
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Login email, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Hashed credential (PHC string); never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Visibility role
    pub role: Role,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user creates many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
