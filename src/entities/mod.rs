//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the record store tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod client;
pub mod invoice;
pub mod invoice_item;
pub mod money;
pub mod payment;
pub mod user;

// Re-export specific types to avoid conflicts
pub use client::{Column as ClientColumn, Entity as Client, Model as ClientModel};
pub use invoice::{
    Column as InvoiceColumn, Entity as Invoice, InvoiceStatus, Model as InvoiceModel,
};
pub use invoice_item::{
    Column as InvoiceItemColumn, Entity as InvoiceItem, Model as InvoiceItemModel,
};
pub use money::Money;
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentMode};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
