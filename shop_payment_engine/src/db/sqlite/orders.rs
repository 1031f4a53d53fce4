use chrono::{Duration, Utc};
use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderNo, OrderUpdate, PaidUpdate},
    traits::OrderStoreError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), OrderStoreError> {
    let inserted = match fetch_order_by_no(&order.no, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.no, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders are always unpaid, open, and have no refund in flight.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (no, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *;
        "#,
    )
    .bind(order.no.as_str())
    .bind(order.total_amount.cents())
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Returns the order with the given external order number.
pub async fn fetch_order_by_no(no: &OrderNo, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE no = $1").bind(no.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the order with the given internal id.
pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Sets the payment fields on an order, if and only if the order is still unpaid and open.
///
/// The check and the write happen in one statement, so two concurrent callers cannot both succeed. Returns the
/// updated order if the write was applied, or `None` if the guard failed (or the order does not exist).
pub async fn mark_paid(
    id: i64,
    payment: PaidUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                paid_at = $1,
                payment_method = $2,
                payment_no = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND paid_at IS NULL AND closed = 0
            RETURNING *;
        "#,
    )
    .bind(payment.paid_at)
    .bind(payment.payment_method.to_string())
    .bind(payment.payment_no)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub(crate) async fn update_order(
    id: i64,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    if update.is_empty() {
        debug!("📝️ No fields to update for order {id}. Update request skipped.");
        return Err(OrderStoreError::OrderModificationNoOp);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = update.refund_status {
        set_clause.push("refund_status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(extra) = update.extra {
        let extra = serde_json::to_string(&extra).map_err(|e| OrderStoreError::SerializationError(e.to_string()))?;
        set_clause.push("extra = ");
        set_clause.push_bind_unseparated(extra);
    }
    if let Some(closed) = update.closed {
        set_clause.push("closed = ");
        set_clause.push_bind_unseparated(closed);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Order::from_row(&row)).transpose()?;
    trace!("📝️ Result of update_order: {res:?}");
    Ok(res)
}

/// Closes every unpaid, open order that was created more than `ttl` ago.
pub(crate) async fn close_expired_orders(
    ttl: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, OrderStoreError> {
    let cutoff = (Utc::now() - ttl).timestamp();
    let orders = sqlx::query_as(
        r#"
            UPDATE orders SET closed = 1, updated_at = CURRENT_TIMESTAMP
            WHERE paid_at IS NULL AND closed = 0 AND unixepoch(created_at) < $1
            RETURNING *;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
