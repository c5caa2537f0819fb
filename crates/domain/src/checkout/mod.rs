//! The order creation engine.
//!
//! Checkout is the one genuinely concurrent-sensitive operation in the
//! marketplace: many requests race for the same stock, and the cart, the
//! catalog, and the order book must move together or not at all. The engine
//! runs every step against one [`CheckoutTx`](market_store::CheckoutTx), and
//! relies on the store's conditional decrement (not on what it read earlier)
//! to decide whether stock is still there at write time.

mod engine;
mod plan;

pub use engine::CheckoutEngine;
pub use plan::freeze_lines;

use common::{ProductId, ShopperId};
use market_store::Address;
use serde::Deserialize;

/// One requested (product, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A checkout request: the caller's cart snapshot plus a destination.
///
/// Quantities and product ids are taken from the caller, prices never are:
/// pricing comes exclusively from the catalog read inside the transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    pub shopper: ShopperId,
    pub items: Vec<ItemRequest>,
    pub shipping_address: Address,
}
