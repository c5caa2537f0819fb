//! Shopping cart records.

use chrono::{DateTime, Utc};
use common::{ProductId, ShopperId};
use serde::{Deserialize, Serialize};

/// One product pending purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Always at least 1; setting a quantity to 0 removes the item instead.
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// A shopper's cart.
///
/// Created lazily on first access and kept for the shopper's lifetime:
/// placing an order empties `items` but preserves the record. A product
/// appears at most once; adding it again sums the quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: ShopperId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for the given shopper.
    pub fn empty(owner: ShopperId) -> Self {
        let now = Utc::now();
        Self {
            owner,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the item for a product, if present.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Returns true if the cart holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Adds `quantity` of a product, summing with any existing entry.
    ///
    /// A zero quantity is a no-op.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
                added_at: Utc::now(),
            }),
        }
        self.touch();
    }

    /// Sets the quantity for a product; 0 removes it, an absent product is
    /// inserted.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity = quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
                added_at: Utc::now(),
            }),
        }
        self.touch();
    }

    /// Removes a product from the cart if present.
    pub fn remove(&mut self, product_id: ProductId) {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() != before {
            self.touch();
        }
    }

    /// Empties the cart, keeping the record. Idempotent.
    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            self.items.clear();
            self.touch();
        }
    }

    /// Folds another cart's items into this one, summing shared products.
    pub fn absorb(&mut self, other: &Cart) {
        for item in &other.items {
            match self.items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) => existing.quantity += item.quantity,
                None => self.items.push(item.clone()),
            }
        }
        if !other.items.is_empty() {
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
