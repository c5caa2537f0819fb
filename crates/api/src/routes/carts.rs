//! Cart endpoints.
//!
//! Carts are keyed by shopper id; guests get one the same way registered
//! shoppers do, and `POST /carts/{owner}/merge` folds a guest cart into the
//! account that the guest upgraded to.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ProductId, ShopperId};
use market_store::{Cart, MarketStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub guest: Uuid,
}

/// GET /carts/:owner — fetch (lazily creating) a cart.
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.store.cart(ShopperId::from_uuid(owner)).await?;
    Ok(Json(cart))
}

/// POST /carts/:owner/items — add a product, summing quantities.
#[tracing::instrument(skip(state))]
pub async fn add_item<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".into()));
    }
    let cart = state
        .store
        .add_cart_item(
            ShopperId::from_uuid(owner),
            ProductId::from_uuid(req.product_id),
            req.quantity,
        )
        .await?;
    Ok(Json(cart))
}

/// PUT /carts/:owner/items/:product_id — set a quantity; 0 removes.
#[tracing::instrument(skip(state))]
pub async fn set_quantity<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner, product_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .store
        .set_cart_item_quantity(
            ShopperId::from_uuid(owner),
            ProductId::from_uuid(product_id),
            req.quantity,
        )
        .await?;
    Ok(Json(cart))
}

/// DELETE /carts/:owner/items/:product_id — remove one product.
pub async fn remove_item<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .store
        .remove_cart_item(ShopperId::from_uuid(owner), ProductId::from_uuid(product_id))
        .await?;
    Ok(Json(cart))
}

/// DELETE /carts/:owner/items — empty the cart.
pub async fn clear<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.store.clear_cart(ShopperId::from_uuid(owner)).await?;
    Ok(Json(cart))
}

/// POST /carts/:owner/merge — merge a guest cart into this one.
#[tracing::instrument(skip(state))]
pub async fn merge<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner): Path<Uuid>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .store
        .merge_guest_cart(ShopperId::from_uuid(req.guest), ShopperId::from_uuid(owner))
        .await?;
    Ok(Json(cart))
}
