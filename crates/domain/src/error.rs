//! Domain error types.

use common::{OrderId, OrderStatus, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Coarse classification of a [`DomainError`], used by callers to pick a
/// transport-level response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Internal,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(UserId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The request was rejected before touching any store.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order is already delivered")]
    AlreadyDelivered,

    /// A store call failed; any transaction it belonged to was rolled back.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Error updating order status: {0}")]
    StatusUpdateFailed(#[source] StoreError),

    /// Stock reversion failed after the order was already marked cancelled.
    ///
    /// `product_id` is `None` when the lines to revert could not be loaded.
    #[error("Stock reversion failed for order {order_id}{}: {source}", reverted_product(.product_id))]
    CompensationFailed {
        order_id: OrderId,
        product_id: Option<ProductId>,
        #[source]
        source: StoreError,
    },
}

fn reverted_product(product_id: &Option<ProductId>) -> String {
    match product_id {
        Some(id) => format!(" (product {id})"),
        None => " (loading order items)".to_string(),
    }
}

impl DomainError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::CustomerNotFound(_)
            | DomainError::OrderNotFound(_)
            | DomainError::ProductNotFound(_) => ErrorKind::NotFound,
            DomainError::Validation(_) => ErrorKind::InvalidInput,
            DomainError::InsufficientStock { .. }
            | DomainError::InvalidTransition { .. }
            | DomainError::AlreadyCancelled
            | DomainError::AlreadyDelivered => ErrorKind::Conflict,
            DomainError::Persistence(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            DomainError::Persistence(StoreError::UniqueViolation(_)) => ErrorKind::Conflict,
            DomainError::Persistence(_)
            | DomainError::StatusUpdateFailed(_)
            | DomainError::CompensationFailed { .. } => ErrorKind::Internal,
        }
    }
}
