//! Persisted records shared between the store backends and the domain.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{HistoryId, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// Lifecycle of a catalog product. Only active products can be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "inactive" => Some(ProductStatus::Inactive),
            "deleted" => Some(ProductStatus::Deleted),
            _ => None,
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Price per unit.
    pub price: Money,
    /// Units available for new orders.
    pub stock: u32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_orderable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

/// Fields required to add a product to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

/// Partial product update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Applies the update to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

/// A registered user. Clients are usually created implicitly when they
/// place their first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: UserId,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Opaque credential hash, only present for admin accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields required to register a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: Option<String>,
}

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    /// Sum of quantity times catalog price at creation time.
    pub total_price: Money,
    pub note: String,
    pub delivery_date: NaiveDate,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// A line of an order. Lines are written once together with the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Product name at the time the order was placed.
    pub product_name: String,
    pub quantity: u32,
    /// Unit price at the time the order was placed.
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns quantity times unit price, or None on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(HistoryAction::Create),
            "update" => Some(HistoryAction::Update),
            "delete" => Some(HistoryAction::Delete),
            _ => None,
        }
    }

    /// The action recorded for a status change: cancelling deletes the
    /// order from the bakery's point of view, anything else updates it.
    pub fn for_status(status: OrderStatus) -> Self {
        if status == OrderStatus::Cancelled {
            HistoryAction::Delete
        } else {
            HistoryAction::Update
        }
    }
}

/// Append-only audit record of an order at the time of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistory {
    pub id: HistoryId,
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub price: Money,
    pub note: String,
    pub delivery_date: NaiveDate,
    pub paid: bool,
    /// The user who performed the action.
    pub actor_id: UserId,
    pub action: HistoryAction,
    pub created_at: DateTime<Utc>,
}

impl OrderHistory {
    /// Snapshots `order` as acted upon by `actor_id`.
    pub fn snapshot(order: &Order, actor_id: UserId, action: HistoryAction) -> Self {
        Self {
            id: HistoryId::new(),
            order_id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            price: order.total_price,
            note: order.note.clone(),
            delivery_date: order.delivery_date,
            paid: order.paid,
            actor_id,
            action,
            created_at: Utc::now(),
        }
    }
}
