//! Role-based product projections.
//!
//! Suppliers and admins see a product's cost price; shoppers never do. The
//! projection is a pure function with a tagged output rather than ad hoc
//! field stripping, so the privileged/cost logic is testable on its own.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, SupplierId};
use market_store::{Product, ProductStatus};
use serde::Serialize;

/// Who is looking at a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Shopper,
    Supplier,
    Admin,
}

impl Role {
    /// Returns true if this role may see cost pricing.
    pub fn sees_cost(self) -> bool {
        matches!(self, Role::Supplier | Role::Admin)
    }
}

/// A product as projected for a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProductView {
    Full(FullProduct),
    Public(PublicProduct),
}

/// Privileged projection: includes cost pricing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullProduct {
    pub id: ProductId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub description: Option<String>,
    pub cost: Option<Money>,
    pub selling: Money,
    pub on_hand: u32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shopper-facing projection: cost pricing stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicProduct {
    pub id: ProductId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub description: Option<String>,
    pub selling: Money,
    pub on_hand: u32,
    pub status: ProductStatus,
}

impl ProductView {
    /// Projects a product for the given viewer role.
    pub fn project(product: &Product, role: Role) -> Self {
        if role.sees_cost() {
            ProductView::Full(FullProduct {
                id: product.id,
                supplier_id: product.supplier_id,
                name: product.name.clone(),
                description: product.description.clone(),
                cost: product.pricing.cost,
                selling: product.pricing.selling,
                on_hand: product.on_hand,
                status: product.status,
                created_at: product.created_at,
                updated_at: product.updated_at,
            })
        } else {
            ProductView::Public(PublicProduct {
                id: product.id,
                supplier_id: product.supplier_id,
                name: product.name.clone(),
                description: product.description.clone(),
                selling: product.pricing.selling,
                on_hand: product.on_hand,
                status: product.status,
            })
        }
    }
}
