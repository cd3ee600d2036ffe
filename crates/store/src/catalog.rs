use async_trait::async_trait;
use common::{NewProduct, Product, ProductId, ProductUpdate};

use crate::Result;

/// Read and maintain the product catalog.
///
/// Stock is decremented only inside an order transaction (see
/// [`OrderTransaction::reserve_stock`](crate::OrderTransaction::reserve_stock));
/// this trait only gives stock back.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Fetches every product whose id is in `ids`, in one round trip.
    ///
    /// Unknown ids are silently skipped, so callers compare sizes to detect
    /// missing products.
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Increments the stock of a product by `quantity`.
    ///
    /// Fails with `NotFound` if the product does not exist.
    async fn revert_stock(&self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Fetches a single product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by name. Deleted and inactive products are
    /// only included when `include_inactive` is set.
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>>;

    /// Adds an active product to the catalog.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Applies a partial update and returns the stored product.
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;
}
