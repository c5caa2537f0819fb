//! Order records and the post-creation status machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, ShopperId, SupplierId};
use serde::{Deserialize, Serialize};

/// Shipping destination; every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

impl Address {
    /// Returns the name of the first blank field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.street.trim().is_empty() {
            Some("street")
        } else if self.city.trim().is_empty() {
            Some("city")
        } else if self.zip.trim().is_empty() {
            Some("zip")
        } else if self.country.trim().is_empty() {
            Some("country")
        } else {
            None
        }
    }
}

/// A frozen snapshot of one purchased product.
///
/// Name and prices are copied from the catalog inside the order-creation
/// transaction; later catalog edits never touch historical orders. The cost
/// price is frozen alongside the selling price so supplier-side accounting
/// stays consistent with what was actually sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub cost_price: Option<Money>,
    pub supplier_id: SupplierId,
}

impl OrderLine {
    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Order totals, computed once at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Totals {
    /// Orders at or above this subtotal ship free.
    pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_cents(50_00);

    /// Flat shipping rate below the threshold.
    pub const FLAT_SHIPPING: Money = Money::from_cents(5_99);

    /// Applies the shipping rule to a subtotal.
    pub fn for_subtotal(subtotal: Money) -> Self {
        let shipping = if subtotal >= Self::FREE_SHIPPING_THRESHOLD {
            Money::zero()
        } else {
            Self::FLAT_SHIPPING
        };
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }

    /// Sums the line totals and applies the shipping rule.
    pub fn for_lines(lines: &[OrderLine]) -> Self {
        Self::for_subtotal(lines.iter().map(OrderLine::line_total).sum())
    }
}

/// The state of an order after creation.
///
/// Transitions are strictly forward:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │             │
///    └─────────────┴──► Cancelled
/// ```
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Returns true if `next` is reachable from this status in one step.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A placed order.
///
/// Created exactly once by the checkout engine; afterwards only `status` and
/// `updated_at` ever change, and orders are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub shopper_id: ShopperId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Address,
    pub totals: Totals,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assembles a new `Pending` order from frozen lines, computing totals.
    pub fn new(shopper_id: ShopperId, lines: Vec<OrderLine>, shipping_address: Address) -> Self {
        let totals = Totals::for_lines(&lines);
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            shopper_id,
            lines,
            shipping_address,
            totals,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if any line belongs to the given supplier.
    pub fn involves_supplier(&self, supplier: SupplierId) -> bool {
        self.lines.iter().any(|l| l.supplier_id == supplier)
    }
}
