//! Order endpoints: checkout, queries, and status workflow.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, ShopperId, SupplierId};
use domain::OrderRequest;
use market_store::{MarketStore, Order, OrderStatus, Page};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

use super::page_request;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub shopper: Option<Uuid>,
    pub supplier: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// POST /orders — the checkout call: turn a cart snapshot into an order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<OrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.engine.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/:id — load one order.
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .store
        .order(OrderId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order))
}

/// GET /orders — list by shopper or by supplier.
///
/// Supplier listings return whole orders; trimming to the supplier's own
/// lines is left to the presentation layer.
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    let page = page_request(query.page, query.per_page);

    let orders = match (query.shopper, query.supplier) {
        (Some(shopper), _) => {
            state
                .store
                .orders_for_shopper(ShopperId::from_uuid(shopper), page, query.status)
                .await?
        }
        (None, Some(supplier)) => {
            state
                .store
                .orders_for_supplier(SupplierId::from_uuid(supplier), page, query.status)
                .await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "a shopper or supplier filter is required; use /admin/orders for the full list"
                    .into(),
            ));
        }
    };

    Ok(Json(orders))
}

/// GET /admin/orders — unfiltered order list (privileged surface).
pub async fn list_all<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    let orders = state
        .store
        .orders(page_request(query.page, query.per_page), query.status)
        .await?;
    Ok(Json(orders))
}

/// POST /orders/:id/status — supplier-driven transition, machine-checked.
#[tracing::instrument(skip(state))]
pub async fn transition<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .workflow
        .transition(OrderId::from_uuid(id), req.status)
        .await?;
    Ok(Json(order))
}

/// PUT /admin/orders/:id/status — admin override, bypasses the machine.
#[tracing::instrument(skip(state))]
pub async fn force_status<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .workflow
        .force_set(OrderId::from_uuid(id), req.status)
        .await?;
    Ok(Json(order))
}
