//! Shared value objects for the bakery order backend.
//!
//! Everything that flows between the store backends, the domain services
//! and the HTTP layer lives here: identifiers, money, the order status
//! state table and the persisted records.

pub mod ids;
pub mod model;
pub mod money;
pub mod status;

pub use ids::{HistoryId, OrderId, OrderItemId, ProductId, UserId};
pub use model::{
    Customer, HistoryAction, NewCustomer, NewProduct, Order, OrderHistory, OrderItem, Product,
    ProductStatus, ProductUpdate, Role,
};
pub use money::Money;
pub use status::OrderStatus;
