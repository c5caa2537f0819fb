//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, ProductId, SupplierId};
use domain::{ProductView, Role};
use market_store::{MarketStore, NewProduct, Page, Pricing, ProductFilter, ProductStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

use super::page_request;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub supplier: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub supplier_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    pub selling_cents: i64,
    pub on_hand: u32,
    #[serde(default)]
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub on_hand: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: ProductStatus,
}

/// GET /products — list active products, shopper projection.
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<ProductView>>, ApiError> {
    let filter = ProductFilter {
        supplier: query.supplier.map(SupplierId::from_uuid),
    };
    let page = state
        .store
        .active_products(filter, page_request(query.page, query.per_page))
        .await?;

    Ok(Json(page.map(|p| ProductView::project(&p, Role::Shopper))))
}

/// GET /products/:id — shopper projection of one product.
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>, ApiError> {
    let product = state
        .store
        .product(ProductId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductView::project(&product, Role::Shopper)))
}

/// GET /admin/products/:id — privileged projection, including cost.
pub async fn get_full<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>, ApiError> {
    let product = state
        .store
        .product(ProductId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductView::project(&product, Role::Admin)))
}

/// POST /products — create a product (supplier/admin surface).
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("product name is required".into()));
    }
    if req.selling_cents < 0 {
        return Err(ApiError::BadRequest("selling price cannot be negative".into()));
    }

    let product = state
        .store
        .insert_product(NewProduct {
            supplier_id: SupplierId::from_uuid(req.supplier_id),
            name: req.name,
            description: req.description,
            pricing: Pricing {
                cost: req.cost_cents.map(Money::from_cents),
                selling: Money::from_cents(req.selling_cents),
            },
            on_hand: req.on_hand,
            status: req.status,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductView::project(&product, Role::Supplier)),
    ))
}

/// PUT /products/:id/stock — absolute stock set (supplier edit path).
#[tracing::instrument(skip(state))]
pub async fn set_stock<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<ProductView>, ApiError> {
    let product = state
        .store
        .set_stock(ProductId::from_uuid(id), req.on_hand)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductView::project(&product, Role::Supplier)))
}

/// PUT /products/:id/status — lifecycle change (admin surface).
#[tracing::instrument(skip(state))]
pub async fn set_status<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<ProductView>, ApiError> {
    let product = state
        .store
        .set_product_status(ProductId::from_uuid(id), req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductView::project(&product, Role::Admin)))
}
