//! Product catalog management.

use common::{NewProduct, Product, ProductId, ProductStatus, ProductUpdate};
use store::{CatalogGateway, StoreError};

use crate::error::DomainError;
use crate::validation::ValidationError;

/// Validated access to the product catalog.
pub struct CatalogService<C> {
    catalog: C,
}

fn not_found(id: ProductId) -> impl FnOnce(StoreError) -> DomainError {
    move |e| match e {
        StoreError::NotFound { .. } => DomainError::ProductNotFound(id),
        other => other.into(),
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyProductName);
    }
    Ok(())
}

impl<C: CatalogGateway> CatalogService<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Lists products by name. Inactive and deleted products are only
    /// included when asked for.
    pub async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, DomainError> {
        Ok(self.catalog.list_products(include_inactive).await?)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.catalog
            .get_product(id)
            .await?
            .ok_or(DomainError::ProductNotFound(id))
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, mut product: NewProduct) -> Result<Product, DomainError> {
        validate_name(&product.name)?;
        if product.price.is_negative() {
            return Err(ValidationError::NegativePrice(product.price.cents()).into());
        }
        product.name = product.name.trim().to_string();

        let created = self.catalog.create_product(product).await?;
        tracing::info!(product_id = %created.id, "product created");
        Ok(created)
    }

    /// Applies a partial update. Fields left as `None` are unchanged.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        mut update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        if let Some(name) = update.name.as_deref() {
            validate_name(name)?;
            update.name = Some(name.trim().to_string());
        }
        if let Some(price) = update.price
            && price.is_negative()
        {
            return Err(ValidationError::NegativePrice(price.cents()).into());
        }

        self.catalog
            .update_product(id, update)
            .await
            .map_err(not_found(id))
    }

    /// Marks a product as deleted. Existing order lines keep referencing it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        let update = ProductUpdate {
            status: Some(ProductStatus::Deleted),
            ..Default::default()
        };
        self.catalog
            .update_product(id, update)
            .await
            .map_err(not_found(id))?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
