//! `SqliteDatabase` is a concrete implementation of an order store backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{db_url, new_pool, orders};
use crate::{
    db_types::{ConditionalUpdate, NewOrder, Order, OrderNo, OrderUpdate, PaidUpdate},
    traits::{OrderManagement, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in the `SHOP_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), OrderStoreError> {
        migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_no(&self, no: &OrderNo) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_no(no, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn mark_order_paid(&self, id: i64, payment: PaidUpdate) -> Result<ConditionalUpdate, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::mark_paid(id, payment, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Order {} marked as paid", order.no);
                Ok(ConditionalUpdate::Applied(order))
            },
            None => {
                let current =
                    orders::fetch_order_by_id(id, &mut conn).await?.ok_or(OrderStoreError::OrderIdNotFound(id))?;
                debug!("🗃️ Order {} was not updated. It is already paid or closed.", current.no);
                Ok(ConditionalUpdate::AlreadyApplied(current))
            },
        }
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(id, update, &mut conn).await?.ok_or(OrderStoreError::OrderIdNotFound(id))
    }

    async fn close_expired_orders(&self, ttl: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let closed = orders::close_expired_orders(ttl, &mut conn).await?;
        if !closed.is_empty() {
            debug!("🗃️ {} unpaid orders closed", closed.len());
        }
        Ok(closed)
    }
}
