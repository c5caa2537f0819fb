//! Pure checkout steps: input validation and snapshot construction.
//!
//! Everything here is deterministic over its inputs so it can be tested
//! without a store; the engine calls these between its transactional steps.

use std::collections::HashMap;

use common::ProductId;
use market_store::{OrderLine, Product};

use crate::error::{CheckoutError, ValidationError};

use super::{ItemRequest, OrderRequest};

impl OrderRequest {
    /// Validates the request and merges duplicate product ids.
    ///
    /// Duplicates are summed (preserving first-seen order) so the engine
    /// issues exactly one conditional decrement per product.
    pub fn normalized_items(&self) -> Result<Vec<ItemRequest>, ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::EmptyOrder);
        }
        if let Some(field) = self.shipping_address.missing_field() {
            return Err(ValidationError::MissingAddressField { field });
        }

        let mut merged: Vec<ItemRequest> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ValidationError::ZeroQuantity {
                    product_id: item.product_id,
                });
            }
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(existing) => existing.quantity += item.quantity,
                None => merged.push(*item),
            }
        }
        Ok(merged)
    }
}

/// Builds the frozen order lines from the in-transaction catalog read.
///
/// `products` must be the result of fetching the requested ids filtered to
/// `active`: any requested id that did not come back is reported as
/// unavailable, and any product with too little stock fails the pre-check.
/// Name and prices on the returned lines come from this read and nowhere
/// else; this is the snapshot freeze point.
pub fn freeze_lines(
    requested: &[ItemRequest],
    products: &[Product],
) -> Result<Vec<OrderLine>, CheckoutError> {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let missing: Vec<ProductId> = requested
        .iter()
        .map(|r| r.product_id)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(CheckoutError::ProductsUnavailable { missing });
    }

    requested
        .iter()
        .map(|r| {
            let product = by_id[&r.product_id];
            if product.on_hand < r.quantity {
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    requested: r.quantity,
                    available: product.on_hand,
                });
            }
            Ok(OrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: r.quantity,
                unit_price: product.pricing.selling,
                cost_price: product.pricing.cost,
                supplier_id: product.supplier_id,
            })
        })
        .collect()
}
