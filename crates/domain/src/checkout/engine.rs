//! The transactional order creation path.

use common::ProductId;
use market_store::{CheckoutTx, MarketStore, Order};

use crate::error::CheckoutError;

use super::{OrderRequest, plan::freeze_lines};

/// Converts checkout requests into durable orders.
///
/// Generic over the store so the same engine runs against PostgreSQL in
/// production and the in-memory store in tests; the isolation and rollback
/// guarantees come from the store's [`CheckoutTx`] contract.
pub struct CheckoutEngine<S> {
    store: S,
}

impl<S: MarketStore> CheckoutEngine<S> {
    /// Creates an engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order from a cart snapshot, atomically.
    ///
    /// Within one transaction: reads the referenced active products, freezes
    /// the name/price snapshot, conditionally decrements each product's
    /// stock, persists the order as `pending`, and empties the purchaser's
    /// cart. Any failure rolls the whole transaction back: no partial
    /// decrement, no order record, cart untouched.
    ///
    /// The engine never retries; a `StockChanged` failure means a concurrent
    /// purchase won the race and the caller should re-read cart and catalog.
    #[tracing::instrument(skip(self, request), fields(shopper = %request.shopper))]
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order, CheckoutError> {
        let items = request.normalized_items()?;
        let ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();

        let mut tx = self.store.begin_checkout().await?;

        let products = tx.active_products(&ids).await?;
        let lines = freeze_lines(&items, &products)?;

        for line in &lines {
            // The decrement re-checks stock at write time; a false here means
            // a concurrent transaction consumed it after our read.
            if !tx.try_decrement(line.product_id, line.quantity).await? {
                metrics::counter!("checkout_stock_conflicts_total").increment(1);
                tracing::warn!(product_id = %line.product_id, "stock changed during checkout");
                return Err(CheckoutError::StockChanged);
            }
        }

        let order = Order::new(request.shopper, lines, request.shipping_address);
        tx.insert_order(&order).await?;
        tx.clear_cart(order.shopper_id).await?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.totals.total, "order created");
        Ok(order)
    }
}
