//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{Money, NewProduct, Product, ProductId, ProductStatus, ProductUpdate};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::auth::{optional_user, require_admin};
use crate::error::ApiError;
use crate::state::{AppState, Backend};

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    /// Include inactive and deleted products. Admin only.
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<u32>,
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: u32,
    pub status: &'static str,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            stock: product.stock,
            status: product.status.as_str(),
        }
    }
}

// -- Handlers --

/// GET /products — list orderable products, or all products for admins
/// passing `?all=true`.
#[tracing::instrument(skip(state, headers, query))]
pub async fn list<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let Query(query) = query?;
    if query.all {
        let user = optional_user(&state, &headers).await?;
        if !user.is_some_and(|u| u.is_admin()) {
            return Err(ApiError::Forbidden(
                "Listing inactive products requires the admin role".to_string(),
            ));
        }
    }

    let products = state.catalog.list_products(query.all).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id} — load a product by ID.
#[tracing::instrument(skip(state))]
pub async fn get<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}

/// POST /products — add a product to the catalog.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            stock: req.stock,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PATCH /products/{id} — partially update a product.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let product_id: ProductId = parse_id(&id)?;
    let Json(req) = payload?;

    let status = req
        .status
        .as_deref()
        .map(|s| {
            ProductStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid product status: {s}")))
        })
        .transpose()?;

    let product = state
        .catalog
        .update_product(
            product_id,
            ProductUpdate {
                name: req.name,
                description: req.description,
                price: req.price_cents.map(Money::from_cents),
                stock: req.stock,
                status,
            },
        )
        .await?;

    Ok(Json(product.into()))
}

/// DELETE /products/{id} — soft-delete a product.
#[tracing::instrument(skip(state, headers))]
pub async fn delete<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers).await?;
    let product_id: ProductId = parse_id(&id)?;
    state.catalog.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
