use crate::db_types::Order;

/// Emitted exactly once, when an order moves from unpaid to paid.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when the expiry worker closes an order that was never paid.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClosedEvent {
    pub order: Order,
}

impl OrderClosedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
