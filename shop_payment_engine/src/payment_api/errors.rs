use thiserror::Error;

use crate::{db_types::OrderNo, traits::OrderStoreError};

/// Only infrastructure failures escape the reconciler. Everything else becomes an acknowledgement.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Could not read or write the order store. {0}")]
    PersistenceFailure(#[from] OrderStoreError),
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Order {} does not exist", .0.as_str())]
    OrderNotFound(OrderNo),
    #[error("Order {} cannot be paid. It is already paid or closed.", .0.as_str())]
    InvalidOrderState(OrderNo),
    #[error("Could not read or write the order store. {0}")]
    PersistenceFailure(#[from] OrderStoreError),
}
