//! Product catalog records.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, SupplierId};
use serde::{Deserialize, Serialize};

/// Cost and selling price for a product.
///
/// `cost` is what the supplier pays and is only shown to privileged roles;
/// `selling` is the price a shopper is charged and the one frozen onto order
/// lines at purchase time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub cost: Option<Money>,
    pub selling: Money,
}

/// Where a product sits in its review lifecycle.
///
/// Only `Active` products are purchasable. Suppliers create products as
/// `Draft` or `PendingReview`; the move to `Active` is an admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    PendingReview,
    Active,
    Rejected,
    Archived,
}

impl ProductStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::PendingReview => "pending_review",
            ProductStatus::Active => "active",
            ProductStatus::Rejected => "rejected",
            ProductStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProductStatus::Draft),
            "pending_review" => Ok(ProductStatus::PendingReview),
            "active" => Ok(ProductStatus::Active),
            "rejected" => Ok(ProductStatus::Rejected),
            "archived" => Ok(ProductStatus::Archived),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A catalog product.
///
/// `on_hand` is the single shared mutable resource in the ordering core. It
/// is decremented only through the store's conditional decrement, so it can
/// never go negative however many purchases race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Owning supplier; immutable after creation.
    pub supplier_id: SupplierId,
    pub name: String,
    pub description: Option<String>,
    pub pricing: Pricing,
    /// Units currently in stock.
    pub on_hand: u32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns true if the product can currently be bought.
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

/// Payload for inserting a product into the catalog.
///
/// The store assigns the id and timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub supplier_id: SupplierId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub pricing: Pricing,
    pub on_hand: u32,
    #[serde(default)]
    pub status: ProductStatus,
}

impl NewProduct {
    /// Materializes the product record, stamping id and timestamps.
    pub fn into_product(self) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            supplier_id: self.supplier_id,
            name: self.name,
            description: self.description,
            pricing: self.pricing,
            on_hand: self.on_hand,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filter for catalog listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    /// Restrict to a single supplier's products.
    pub supplier: Option<SupplierId>,
}
