use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    Customer, NewCustomer, NewProduct, Order, OrderHistory, OrderId, OrderItem, OrderStatus,
    Product, ProductId, ProductStatus, ProductUpdate, UserId,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    CatalogGateway, CustomerDirectory, OrderStore, OrderTransaction, Result, StoreError,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    users: HashMap<UserId, Customer>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
    history: Vec<OrderHistory>,
}

/// Injected failures and call recording, used by tests.
#[derive(Debug, Default)]
struct Controls {
    fail_on_email_lookup: bool,
    fail_on_status_update: bool,
    fail_on_history: bool,
    fail_on_item_insert: bool,
    fail_on_item_load: bool,
    fail_revert_for: HashSet<ProductId>,
    revert_calls: Vec<(ProductId, u32)>,
}

/// In-memory implementation of every store trait.
///
/// A transaction holds the write lock for its whole lifetime and works on a
/// private copy of the tables that replaces the shared copy on commit, so
/// transactions are fully serialized and rollback is free.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    controls: Arc<Mutex<Controls>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn controls(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `get_by_email` fail.
    pub fn set_fail_on_email_lookup(&self, fail: bool) {
        self.controls().fail_on_email_lookup = fail;
    }

    /// Makes `update_status` fail.
    pub fn set_fail_on_status_update(&self, fail: bool) {
        self.controls().fail_on_status_update = fail;
    }

    /// Makes `append_history` fail.
    pub fn set_fail_on_history(&self, fail: bool) {
        self.controls().fail_on_history = fail;
    }

    /// Makes `insert_items` fail inside transactions opened afterwards.
    pub fn set_fail_on_item_insert(&self, fail: bool) {
        self.controls().fail_on_item_insert = fail;
    }

    /// Makes `get_items_by_order_id` fail.
    pub fn set_fail_on_item_load(&self, fail: bool) {
        self.controls().fail_on_item_load = fail;
    }

    /// Makes `revert_stock` fail for one product.
    pub fn fail_revert_for(&self, product_id: ProductId) {
        self.controls().fail_revert_for.insert(product_id);
    }

    /// Returns every `revert_stock` call received, in call order, including
    /// failed ones.
    pub fn revert_calls(&self) -> Vec<(ProductId, u32)> {
        self.controls().revert_calls.clone()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of stored order lines.
    pub async fn item_count(&self) -> usize {
        self.tables.read().await.items.len()
    }

    /// Returns the number of registered users.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Returns the number of history records.
    pub async fn history_count(&self) -> usize {
        self.tables.read().await.history.len()
    }
}

#[async_trait]
impl CatalogGateway for InMemoryStore {
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let wanted: HashSet<&ProductId> = ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn revert_stock(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        {
            let mut controls = self.controls();
            controls.revert_calls.push((product_id, quantity));
            if controls.fail_revert_for.contains(&product_id) {
                return Err(StoreError::Unavailable(format!(
                    "stock reversion refused for {product_id}"
                )));
            }
        }

        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        product.stock = product.stock.saturating_add(quantity);
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| include_inactive || p.is_orderable())
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<Customer>> {
        if self.controls().fail_on_email_lookup {
            return Err(StoreError::Unavailable("customer lookup refused".to_string()));
        }
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_customer_by_id(&self, id: UserId) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create(&self, customer: NewCustomer) -> Result<UserId> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == customer.email) {
            return Err(StoreError::UniqueViolation(format!(
                "email {} already registered",
                customer.email
            )));
        }

        let id = UserId::new();
        tables.users.insert(
            id,
            Customer {
                id,
                role: customer.role,
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                password_hash: customer.password_hash,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let fail_on_item_insert = self.controls().fail_on_item_insert;
        let guard = self.tables.clone().write_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            working,
            fail_on_item_insert,
        }))
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, customer_id: Option<UserId>) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| customer_id.is_none_or(|c| o.customer_id == c))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool> {
        if self.controls().fail_on_status_update {
            return Err(StoreError::Unavailable("status update refused".to_string()));
        }
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = status;
        Ok(true)
    }

    async fn get_items_by_order_id(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        if self.controls().fail_on_item_load {
            return Err(StoreError::Unavailable("order items unavailable".to_string()));
        }
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.order_id == id)
            .cloned()
            .collect())
    }

    async fn append_history(&self, record: OrderHistory) -> Result<()> {
        if self.controls().fail_on_history {
            return Err(StoreError::Unavailable("history append refused".to_string()));
        }
        self.tables.write().await.history.push(record);
        Ok(())
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistory>> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.order_id == id)
            .cloned()
            .collect())
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: Option<OwnedRwLockWriteGuard<Tables>>,
    working: Tables,
    fail_on_item_insert: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<()> {
        if self.guard.is_some() {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed)
        }
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        self.ensure_open()?;
        match self.working.products.get_mut(&product_id) {
            Some(product) if product.is_orderable() && product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.ensure_open()?;
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::UniqueViolation(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        self.ensure_open()?;
        if self.fail_on_item_insert {
            return Err(StoreError::Unavailable("item insert refused".to_string()));
        }
        self.working.items.extend_from_slice(items);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.guard.take().ok_or(StoreError::TransactionClosed)?;
        self.working = Tables::default();
        Ok(())
    }
}
