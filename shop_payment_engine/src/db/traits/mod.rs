//! #  Database management and control.
//!
//! This module provides the interface contracts that order store *backends* must fulfil.
//!
//! * [`OrderManagement`] defines the lookups and writes the payment reconciliation flows need: fetching an order by
//!   its external order number, the guarded "mark as paid" write, and plain partial updates for refund results.
mod order_management;

pub use order_management::{OrderManagement, OrderStoreError};
