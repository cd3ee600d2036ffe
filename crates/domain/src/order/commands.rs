//! Order commands.

use chrono::NaiveDate;
use common::{OrderId, OrderStatus, ProductId, UserId};

use crate::customer::CustomerInfo;

/// One requested line: a product and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place a new order.
///
/// Prices are never part of the command; totals always come from the
/// catalog.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Who the order is for. Unknown emails are registered as clients.
    pub customer: CustomerInfo,

    /// Free-text instructions.
    pub note: String,

    /// Must be strictly after the current UTC date.
    pub delivery_date: NaiveDate,

    pub items: Vec<LineItem>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command with an empty note.
    pub fn new(customer: CustomerInfo, delivery_date: NaiveDate, items: Vec<LineItem>) -> Self {
        Self {
            customer,
            note: String::new(),
            delivery_date,
            items,
        }
    }

    /// Sets the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    pub fn client(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub actor: Actor,
}

impl UpdateOrderStatus {
    pub fn new(order_id: OrderId, new_status: OrderStatus, actor: Actor) -> Self {
        Self {
            order_id,
            new_status,
            actor,
        }
    }
}
