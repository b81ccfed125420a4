/// Client CRUD and per-client balances
pub mod client;
/// Role-scoped dashboard aggregates
pub mod dashboard;
/// Invoice creation, numbering, reads and updates
pub mod invoice;
/// Payment recording with in-transaction status reconciliation
pub mod payment;
/// Caller identity and record visibility
pub mod scope;
/// Invoice status state machine and overdue correction
pub mod status;
/// Line item and invoice total arithmetic
pub mod totals;

pub use scope::Scope;
