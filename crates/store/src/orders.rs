use async_trait::async_trait;
use common::{Order, OrderHistory, OrderId, OrderItem, OrderStatus, ProductId, UserId};
use futures_util::future::BoxFuture;

use crate::{Result, StoreError};

/// Persistence of orders, their lines and their history.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Opens a transaction. Dropping it without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>>;

    /// Fetches an order header. Returns None if it doesn't exist.
    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists order headers, newest first, optionally for one customer only.
    async fn list_orders(&self, customer_id: Option<UserId>) -> Result<Vec<Order>>;

    /// Sets the status of an order if it is still `expected`.
    ///
    /// Returns false, without writing, when another caller changed the
    /// status first. Transition rules are not checked here; fails with
    /// `NotFound` if the order doesn't exist.
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool>;

    /// Fetches the lines of an order in insertion order.
    async fn get_items_by_order_id(&self, id: OrderId) -> Result<Vec<OrderItem>>;

    /// Appends an audit record.
    async fn append_history(&self, record: OrderHistory) -> Result<()>;

    /// Fetches the audit trail of an order, oldest first.
    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistory>>;
}

/// A unit of work against the order tables.
///
/// Nothing written through a transaction is visible to other callers
/// until [`commit`](OrderTransaction::commit) succeeds.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Decrements stock by `quantity` if at least that many units are
    /// available and the product is active.
    ///
    /// Returns false, without changing anything, when the condition fails.
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// Inserts an order header.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts order lines.
    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()>;

    /// Makes every write of this transaction durable.
    async fn commit(&mut self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(&mut self) -> Result<()>;
}

/// Runs `f` inside a transaction of `store`.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A
/// failed rollback is logged and the original error is returned.
pub async fn with_transaction<S, F, T, E>(store: &S, f: F) -> std::result::Result<T, E>
where
    S: OrderStore + ?Sized,
    F: for<'t> FnOnce(&'t mut dyn OrderTransaction) -> BoxFuture<'t, std::result::Result<T, E>>,
    E: From<StoreError>,
{
    let mut tx = store.begin().await?;

    match f(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// Extension trait providing composite operations for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Reserves stock for every line, then writes the header and the lines,
    /// all in one transaction.
    ///
    /// Fails with `InsufficientStock` for the first line whose product
    /// cannot cover its quantity; nothing is written in that case.
    async fn create_order_atomic(&self, order: Order, items: Vec<OrderItem>) -> Result<()> {
        with_transaction(self, move |tx| {
            Box::pin(async move {
                for item in &items {
                    if !tx.reserve_stock(item.product_id, item.quantity).await? {
                        return Err(StoreError::InsufficientStock {
                            product_id: item.product_id,
                        });
                    }
                }
                tx.insert_order(&order).await?;
                tx.insert_items(&items).await?;
                Ok(())
            })
        })
        .await
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
