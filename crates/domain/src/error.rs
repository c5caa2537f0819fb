//! Typed failures for the ordering core.
//!
//! Nothing here is retried internally: every error aborts the whole
//! operation (checkout rolls back its transaction) and is handed to the
//! caller, who decides on messaging and whether to refresh and retry.

use common::{OrderId, ProductId};
use market_store::{OrderStatus, StoreError};
use thiserror::Error;

/// Malformed checkout input, rejected before any store work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request contained no items.
    #[error("order must contain at least one item")]
    EmptyOrder,

    /// A required shipping address field was blank.
    #[error("shipping address is missing required field: {field}")]
    MissingAddressField { field: &'static str },

    /// An item asked for a quantity of zero.
    #[error("quantity for product {product_id} must be at least 1")]
    ZeroQuantity { product_id: ProductId },
}

/// Errors that can occur while creating an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested products that do not exist or are not currently `active`.
    /// Callers should refresh the cart view.
    #[error("products unavailable or not purchasable: {missing:?}")]
    ProductsUnavailable { missing: Vec<ProductId> },

    /// A product had less stock than requested at the pre-check.
    #[error("insufficient stock for \"{name}\": requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// A concurrent purchase consumed the stock between the pre-check and
    /// the conditional decrement. Callers need a fresh read of cart and
    /// catalog, not a blind retry.
    #[error("stock changed while placing the order, please refresh and try again")]
    StockChanged,

    /// The underlying store failed; nothing was committed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur while moving an order through its lifecycle.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status is not reachable from the current one.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
