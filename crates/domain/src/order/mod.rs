//! Order lifecycle: creation, status transitions and queries.

mod commands;
mod creation;
mod service;
mod status;

pub use commands::{Actor, LineItem, PlaceOrder, UpdateOrderStatus};
pub use creation::{OrderCreationService, validate_order};
pub use service::{OrderDetails, OrderService};
pub use status::{OrderStatusEngine, check_transition};
