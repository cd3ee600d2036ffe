//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::NaiveDate;
use common::{Order, OrderHistory, OrderId, OrderItem, OrderStatus};
use domain::{CustomerInfo, LineItem, OrderDetails, PlaceOrder, UpdateOrderStatus};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::auth::{CurrentUser, require_admin, require_user};
use crate::error::ApiError;
use crate::state::{AppState, Backend};

// -- Request types --

#[derive(Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Body of `POST /orders`. Unknown fields, such as client-side prices, are
/// ignored.
#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerRequest,
    #[serde(default)]
    pub note: String,
    pub delivery_date: NaiveDate,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub note: String,
    pub delivery_date: NaiveDate,
    pub paid: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub actor_id: String,
    pub action: &'static str,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status,
            total_cents: order.total_price.cents(),
            note: order.note,
            delivery_date: order.delivery_date,
            paid: order.paid,
            created_at: order.created_at.to_rfc3339(),
            items: None,
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let mut response = OrderResponse::from(details.order);
        response.items = Some(details.items.into_iter().map(Into::into).collect());
        response
    }
}

impl From<OrderHistory> for HistoryResponse {
    fn from(record: OrderHistory) -> Self {
        Self {
            id: record.id.to_string(),
            status: record.status,
            total_cents: record.price.cents(),
            actor_id: record.actor_id.to_string(),
            action: record.action.as_str(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders — place an order. Prices come from the catalog.
#[tracing::instrument(skip(state, payload))]
pub async fn create<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = payload?;

    let items = req
        .items
        .iter()
        .map(|item| -> Result<LineItem, ApiError> {
            Ok(LineItem::new(parse_id(&item.product_id)?, item.quantity))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let cmd = PlaceOrder::new(
        CustomerInfo::new(req.customer.name, req.customer.email, req.customer.phone),
        req.delivery_date,
        items,
    )
    .with_note(req.note);
    let order_id = state.orders.create_order(cmd).await?;

    let response = OrderCreatedResponse {
        order_id: order_id.to_string(),
        status: OrderStatus::Pending,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders — all orders for admins, own orders for clients.
#[tracing::instrument(skip(state, headers))]
pub async fn list<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let filter = (!user.is_admin()).then(|| user.id());

    let orders = state.orders.list_orders(filter).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// Loads an order the user is allowed to see. Other customers' orders are
/// reported as missing.
async fn visible_order<B: Backend>(
    state: &AppState<B>,
    user: &CurrentUser,
    order_id: OrderId,
) -> Result<OrderDetails, ApiError> {
    let details = state.orders.get_order(order_id).await?;
    if !user.is_admin() && details.order.customer_id != user.id() {
        return Err(ApiError::NotFound(format!("Order {order_id} not found")));
    }
    Ok(details)
}

/// GET /orders/{id} — load an order with its lines.
#[tracing::instrument(skip(state, headers))]
pub async fn get<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let order_id: OrderId = parse_id(&id)?;

    let details = visible_order(&state, &user, order_id).await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/{id}/status — move an order to a new status.
///
/// Admins may apply any allowed transition; clients may only cancel their
/// own orders.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update_status<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let order_id: OrderId = parse_id(&id)?;
    let Json(req) = payload?;
    let new_status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: common::status::ParseStatusError| ApiError::BadRequest(e.to_string()))?;

    if !user.is_admin() {
        visible_order(&state, &user, order_id).await?;
        if new_status != OrderStatus::Cancelled {
            return Err(ApiError::Forbidden(
                "Clients may only cancel their orders".to_string(),
            ));
        }
    }

    state
        .orders
        .update_status(UpdateOrderStatus::new(order_id, new_status, user.actor()))
        .await?;

    let details = state.orders.get_order(order_id).await?;
    Ok(Json(details.into()))
}

/// GET /orders/{id}/history — audit trail of an order.
#[tracing::instrument(skip(state, headers))]
pub async fn history<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryResponse>>, ApiError> {
    require_admin(&state, &headers).await?;
    let order_id: OrderId = parse_id(&id)?;

    let records = state.orders.order_history(order_id).await?;
    Ok(Json(records.into_iter().map(HistoryResponse::from).collect()))
}
