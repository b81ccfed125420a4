//! Caller scope - who is asking, and which invoices they may see.
//!
//! A [`Scope`] is produced by the credential gate in [`crate::auth`] and passed
//! explicitly to every operation that reads or mutates scoped records. Visibility is
//! decided by matching the closed [`Role`] enum; nothing here reads ambient state.

use crate::{
    entities::{Role, invoice},
    errors::{Error, Result},
};
use sea_orm::{Condition, prelude::*};

/// The `(user_id, role)` pair that determines record visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    /// Authenticated user id
    pub user_id: i64,
    /// Role of that user
    pub role: Role,
}

impl Scope {
    /// Creates a scope for the given user and role.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Unrestricted scope for maintenance tasks that run without a human caller.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            user_id: 0,
            role: Role::Admin,
        }
    }

    /// Condition restricting an invoice query to what this scope may see.
    #[must_use]
    pub fn invoice_condition(&self) -> Condition {
        match self.role {
            Role::Admin => Condition::all(),
            Role::Accountant => {
                Condition::all().add(invoice::Column::CreatedBy.eq(self.user_id))
            }
        }
    }

    /// Whether this scope may read or change an invoice created by `created_by`.
    #[must_use]
    pub const fn can_access(&self, created_by: i64) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Accountant => self.user_id == created_by,
        }
    }

    /// Fails with [`Error::AccessDenied`] unless [`Scope::can_access`] holds.
    pub fn ensure_access(&self, created_by: i64) -> Result<()> {
        if self.can_access(created_by) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Fails with [`Error::AccessDenied`] unless this scope is an admin.
    pub fn ensure_admin(&self) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Accountant => Err(Error::AccessDenied),
        }
    }
}
