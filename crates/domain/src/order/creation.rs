//! Order creation: validation, customer resolution, stock reservation and
//! pricing.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use common::{
    HistoryAction, Money, Order, OrderHistory, OrderId, OrderItem, OrderItemId, OrderStatus,
    Product, ProductId,
};
use store::{CatalogGateway, CustomerDirectory, OrderStore, OrderStoreExt, StoreError};

use crate::customer::CustomerService;
use crate::error::DomainError;
use crate::validation::{ValidationError, validate_delivery_date, validate_email};

use super::PlaceOrder;

/// Checks a command without touching any store and returns the total
/// quantity requested per product, in first-seen order.
pub fn validate_order(
    cmd: &PlaceOrder,
    today: NaiveDate,
) -> Result<Vec<(ProductId, u32)>, ValidationError> {
    validate_email(&cmd.customer.email)?;
    if cmd.items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    validate_delivery_date(cmd.delivery_date, today)?;

    let mut totals: Vec<(ProductId, u32)> = Vec::new();
    for line in &cmd.items {
        if line.quantity == 0 {
            return Err(ValidationError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, total)) => *total = total.saturating_add(line.quantity),
            None => totals.push((line.product_id, line.quantity)),
        }
    }
    Ok(totals)
}

/// Builds order lines from catalog products and returns them with the
/// order total.
fn price_lines(
    order_id: OrderId,
    cmd: &PlaceOrder,
    products: &HashMap<ProductId, Product>,
) -> Result<(Vec<OrderItem>, Money), DomainError> {
    let mut total = Money::zero();
    let mut items = Vec::with_capacity(cmd.items.len());

    for line in &cmd.items {
        let product = products
            .get(&line.product_id)
            .ok_or(DomainError::ProductNotFound(line.product_id))?;
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        };
        total = item
            .line_total()
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or(ValidationError::TotalOverflow)?;
        items.push(item);
    }

    Ok((items, total))
}

/// Creates orders.
pub struct OrderCreationService<C, D, S> {
    catalog: C,
    customers: CustomerService<D>,
    orders: S,
}

impl<C, D, S> OrderCreationService<C, D, S>
where
    C: CatalogGateway,
    D: CustomerDirectory,
    S: OrderStore,
{
    pub fn new(catalog: C, directory: D, orders: S) -> Self {
        Self {
            catalog,
            customers: CustomerService::new(directory),
            orders,
        }
    }

    /// Places an order and returns its id.
    ///
    /// Stock is reserved and the order written in a single transaction, so
    /// on any error nothing but a newly registered customer is persisted.
    #[tracing::instrument(skip(self, cmd), fields(email = %cmd.customer.email, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<OrderId, DomainError> {
        let start = Instant::now();

        match self.place(cmd).await {
            Ok(order_id) => {
                let duration = start.elapsed().as_secs_f64();
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_creation_duration_seconds").record(duration);
                tracing::info!(%order_id, duration, "order created");
                Ok(order_id)
            }
            Err(e) => {
                metrics::counter!("order_creation_failed_total").increment(1);
                tracing::warn!(error = %e, "order creation failed");
                Err(e)
            }
        }
    }

    async fn place(&self, cmd: PlaceOrder) -> Result<OrderId, DomainError> {
        let requested = validate_order(&cmd, Utc::now().date_naive())?;

        let customer = self.customers.get_or_create_user(&cmd.customer).await?;

        let ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();
        let products: HashMap<ProductId, Product> = self
            .catalog
            .get_products_by_ids(&ids)
            .await?
            .into_iter()
            .filter(Product::is_orderable)
            .map(|p| (p.id, p))
            .collect();
        if products.len() != ids.len() {
            let missing = ids
                .iter()
                .find(|id| !products.contains_key(id))
                .copied()
                .unwrap_or_default();
            return Err(DomainError::ProductNotFound(missing));
        }

        // Advisory check for a precise error; the reservation below is the
        // authoritative one.
        for (product_id, quantity) in &requested {
            if products[product_id].stock < *quantity {
                return Err(DomainError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                });
            }
        }

        let order_id = OrderId::new();
        let (items, total_price) = price_lines(order_id, &cmd, &products)?;
        let order = Order {
            id: order_id,
            customer_id: customer.id,
            status: OrderStatus::Pending,
            total_price,
            note: cmd.note,
            delivery_date: cmd.delivery_date,
            paid: false,
            created_at: Utc::now(),
        };

        self.orders
            .create_order_atomic(order.clone(), items)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientStock { product_id } => DomainError::InsufficientStock {
                    product_id,
                    requested: requested
                        .iter()
                        .find(|(id, _)| *id == product_id)
                        .map_or(0, |(_, q)| *q),
                },
                other => DomainError::Persistence(other),
            })?;

        let record = OrderHistory::snapshot(&order, customer.id, HistoryAction::Create);
        if let Err(e) = self.orders.append_history(record).await {
            metrics::counter!("order_history_append_failed_total").increment(1);
            tracing::warn!(%order_id, error = %e, "failed to append order history");
        }

        Ok(order_id)
    }
}
