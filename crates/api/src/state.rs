//! Shared application state.

use domain::{CatalogService, CustomerService, OrderService};
use store::{CatalogGateway, CustomerDirectory, OrderStore};

/// A storage backend able to serve every route.
pub trait Backend: CatalogGateway + CustomerDirectory + OrderStore + Clone + 'static {}

impl<T> Backend for T where T: CatalogGateway + CustomerDirectory + OrderStore + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<B: Backend> {
    pub orders: OrderService<B>,
    pub catalog: CatalogService<B>,
    pub customers: CustomerService<B>,
}

impl<B: Backend> AppState<B> {
    /// Builds every service over one backend.
    pub fn new(backend: B) -> Self {
        Self {
            orders: OrderService::new(backend.clone()),
            catalog: CatalogService::new(backend.clone()),
            customers: CustomerService::new(backend),
        }
    }
}
