//! Order service combining creation, status changes and queries.

use common::{Order, OrderHistory, OrderId, OrderItem, UserId};
use serde::Serialize;
use store::{CatalogGateway, CustomerDirectory, OrderStore};

use crate::error::DomainError;

use super::{OrderCreationService, OrderStatusEngine, PlaceOrder, UpdateOrderStatus};

/// An order header with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Service for managing orders.
///
/// Wraps the creation service and the status engine over a single backend
/// and adds read-only queries.
pub struct OrderService<S> {
    creation: OrderCreationService<S, S, S>,
    status: OrderStatusEngine<S, S>,
    store: S,
}

impl<S> OrderService<S>
where
    S: CatalogGateway + CustomerDirectory + OrderStore + Clone,
{
    /// Creates a new order service over the given backend.
    pub fn new(store: S) -> Self {
        Self {
            creation: OrderCreationService::new(store.clone(), store.clone(), store.clone()),
            status: OrderStatusEngine::new(store.clone(), store.clone()),
            store,
        }
    }

    /// Places a new order. See [`OrderCreationService::create_order`].
    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<OrderId, DomainError> {
        self.creation.create_order(cmd).await
    }

    /// Changes the status of an order. See [`OrderStatusEngine::update_status`].
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<(), DomainError> {
        self.status.update_status(cmd).await
    }

    /// Loads an order and its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails, DomainError> {
        let order = self
            .store
            .get_by_id(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        let items = self.store.get_items_by_order_id(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Lists orders newest first, optionally restricted to one customer.
    pub async fn list_orders(&self, customer_id: Option<UserId>) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders(customer_id).await?)
    }

    /// Returns the audit trail of an order, oldest first.
    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<OrderHistory>, DomainError> {
        if self.store.get_by_id(order_id).await?.is_none() {
            return Err(DomainError::OrderNotFound(order_id));
        }
        Ok(self.store.get_history(order_id).await?)
    }
}
