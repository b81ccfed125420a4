//! Invoice computation engine.
//!
//! Pure arithmetic over line items, tax and discount. Nothing here touches the store;
//! callers run [`compute_invoice_totals`] before opening a transaction so that invalid
//! input is rejected before any write.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of an invoice as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    /// What was sold
    pub description: String,
    /// Units billed, must be at least 1
    pub quantity: i32,
    /// Price per unit, must not be negative
    pub unit_price: Decimal,
}

impl LineItemInput {
    /// Convenience constructor.
    pub fn new(description: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// `quantity * unit_price` for this line.
    pub fn line_total(&self) -> Result<Decimal> {
        line_total(self.quantity, self.unit_price)
    }
}

/// Result of totalling an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    /// Sum of all line totals
    pub subtotal: Decimal,
    /// `subtotal + tax - discount`; may be negative
    pub total: Decimal,
}

/// Line total for a quantity and unit price.
///
/// # Errors
/// [`Error::Validation`] if the product does not fit in a `Decimal`.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(too_large)
}

/// Adds amounts, rejecting a sum that does not fit in a `Decimal`.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(too_large)
}

fn too_large() -> Error {
    Error::validation("Amount too large")
}

/// Validates the items, tax and discount, then computes subtotal and total.
///
/// A discount larger than `subtotal + tax` produces a negative total, which is kept
/// as-is rather than clamped to zero.
///
/// # Errors
/// [`Error::Validation`] when the item list is empty, a description is blank, a
/// quantity is below 1, a unit price is negative, tax/discount is negative, or an
/// amount overflows.
pub fn compute_invoice_totals(
    items: &[LineItemInput],
    tax: Decimal,
    discount: Decimal,
) -> Result<InvoiceTotals> {
    if items.is_empty() {
        return Err(Error::validation("At least one line item is required"));
    }
    for (index, item) in items.iter().enumerate() {
        validate_item(index, item)?;
    }
    if tax < Decimal::ZERO {
        return Err(Error::validation("Tax cannot be negative"));
    }
    if discount < Decimal::ZERO {
        return Err(Error::validation("Discount cannot be negative"));
    }

    let line_totals = items
        .iter()
        .map(LineItemInput::line_total)
        .collect::<Result<Vec<_>>>()?;
    let subtotal = checked_sum(line_totals)?;
    let total = subtotal
        .checked_add(tax)
        .and_then(|gross| gross.checked_sub(discount))
        .ok_or_else(too_large)?;

    Ok(InvoiceTotals { subtotal, total })
}

fn validate_item(index: usize, item: &LineItemInput) -> Result<()> {
    let line = index + 1;
    if item.description.trim().is_empty() {
        return Err(Error::validation(format!(
            "Line {line}: description is required"
        )));
    }
    if item.quantity < 1 {
        return Err(Error::validation(format!(
            "Line {line}: quantity must be at least 1"
        )));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Line {line}: unit price cannot be negative"
        )));
    }
    Ok(())
}
