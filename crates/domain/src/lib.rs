//! Domain layer for the bakery order system.
//!
//! This crate provides:
//! - `OrderCreationService`: validated, stock-reserving order creation
//! - `OrderStatusEngine`: the order state machine with stock compensation
//! - `CustomerService` and `CatalogService` for customers and products
//! - `OrderService`, a facade over all of the above for one backend

pub mod catalog;
pub mod customer;
pub mod error;
pub mod order;
pub mod validation;

pub use catalog::CatalogService;
pub use customer::{CustomerInfo, CustomerService};
pub use error::{DomainError, ErrorKind};
pub use order::{
    Actor, LineItem, OrderCreationService, OrderDetails, OrderService, OrderStatusEngine,
    PlaceOrder, UpdateOrderStatus, check_transition, validate_order,
};
pub use validation::ValidationError;
