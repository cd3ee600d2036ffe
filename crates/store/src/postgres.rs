use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    Customer, HistoryAction, Money, NewCustomer, NewProduct, Order, OrderHistory, OrderId,
    OrderItem, OrderStatus, Product, ProductId, ProductStatus, ProductUpdate, Role, UserId,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogGateway, CustomerDirectory, OrderStore, OrderTransaction, Result, StoreError,
};

/// PostgreSQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    let status: String = row.try_get("status")?;
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        status: ProductStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown product status: {status}")))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_customer(row: PgRow) -> Result<Customer> {
    let role: String = row.try_get("role")?;
    Ok(Customer {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role: {role}")))?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn parse_status(row: &PgRow) -> Result<OrderStatus> {
    let status: String = row.try_get("status")?;
    status
        .parse()
        .map_err(|e: common::status::ParseStatusError| StoreError::Corrupt(e.to_string()))
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        status: parse_status(&row)?,
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        note: row.try_get("note")?,
        delivery_date: row.try_get::<NaiveDate, _>("delivery_date")?,
        paid: row.try_get("paid")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: common::OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_history(row: PgRow) -> Result<OrderHistory> {
    let action: String = row.try_get("action")?;
    Ok(OrderHistory {
        id: common::HistoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        status: parse_status(&row)?,
        price: Money::from_cents(row.try_get("price_cents")?),
        note: row.try_get("note")?,
        delivery_date: row.try_get::<NaiveDate, _>("delivery_date")?,
        paid: row.try_get("paid")?,
        actor_id: UserId::from_uuid(row.try_get::<Uuid, _>("actor_id")?),
        action: HistoryAction::parse(&action)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown history action: {action}")))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl CatalogGateway for PostgresStore {
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, status, created_at, updated_at
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn revert_stock(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product_id));
        }
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, status, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, status, created_at, updated_at
            FROM products
            WHERE $1 OR status = 'active'
            ORDER BY name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            RETURNING id, name, description, price_cents, stock, status, created_at, updated_at
            "#,
        )
        .bind(ProductId::new().as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .fetch_one(&self.pool)
        .await?;

        row_to_product(row)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                stock = COALESCE($5, stock),
                status = COALESCE($6, status),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, price_cents, stock, status, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.name)
        .bind(update.description)
        .bind(update.price.map(|p| p.cents()))
        .bind(update.stock.map(i64::from))
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_product(row),
            None => Err(StoreError::not_found("Product", id)),
        }
    }
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, role, name, email, phone, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_customer).transpose()
    }

    async fn get_customer_by_id(&self, id: UserId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, role, name, email, phone, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_customer).transpose()
    }

    async fn create(&self, customer: NewCustomer) -> Result<UserId> {
        let id = UserId::new();
        sqlx::query(
            r#"
            INSERT INTO users (id, role, name, email, phone, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(customer.role.as_str())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("users_email_key")
            {
                return StoreError::UniqueViolation(format!(
                    "email {} already registered",
                    customer.email
                ));
            }
            StoreError::Database(e)
        })?;

        Ok(id)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_price_cents, note, delivery_date, paid, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn list_orders(&self, customer_id: Option<UserId>) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_price_cents, note, delivery_date, paid, created_at
            FROM orders
            WHERE $1::uuid IS NULL OR customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id.map(|c| c.as_uuid()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(StoreError::not_found("Order", id));
        }
        Ok(false)
    }

    async fn get_items_by_order_id(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn append_history(&self, record: OrderHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_history
                (id, order_id, customer_id, status, price_cents, note, delivery_date, paid,
                 actor_id, action, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.customer_id.as_uuid())
        .bind(record.status.as_str())
        .bind(record.price.cents())
        .bind(&record.note)
        .bind(record.delivery_date)
        .bind(record.paid)
        .bind(record.actor_id.as_uuid())
        .bind(record.action.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, customer_id, status, price_cents, note, delivery_date, paid,
                   actor_id, action, created_at
            FROM order_history
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_history).collect()
    }
}

/// Transaction over a [`PostgresStore`]. Dropping it uncommitted rolls back.
pub struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1 AND stock >= $2 AND status = 'active'
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, customer_id, status, total_price_cents, note, delivery_date, paid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_price.cents())
        .bind(&order.note)
        .bind(order.delivery_date)
        .bind(order.paid)
        .bind(order.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        for (line_no, item) in (1_i32..).zip(items) {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, line_no, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(line_no)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(self.conn()?)
            .await?;
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
