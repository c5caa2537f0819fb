use async_trait::async_trait;
use common::{OrderId, ProductId, ShopperId, SupplierId};

use crate::{
    Cart, NewProduct, Order, OrderStatus, Page, PageRequest, Product, ProductFilter,
    ProductStatus, Result,
};

/// Core trait for marketplace store implementations.
///
/// Covers the three stores of the ordering core (product catalog, carts,
/// and orders) plus the transactional entry point used by order creation.
/// All implementations must be thread-safe (Send + Sync); every method is a
/// suspension point and never blocks other requests.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// The transactional handle produced by [`begin_checkout`](Self::begin_checkout).
    type Checkout: CheckoutTx;

    // -- Catalog --

    /// Inserts a product, assigning its id and timestamps.
    async fn insert_product(&self, new: NewProduct) -> Result<Product>;

    /// Fetches a product by id.
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists `active` products, newest first.
    async fn active_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>>;

    /// Sets the absolute stock level for a product.
    ///
    /// This is the supplier/admin edit path and is deliberately NOT routed
    /// through the conditional decrement: it is a plain last-writer-wins
    /// write that can interleave with an in-flight checkout. The checkout's
    /// own decrement still never drives stock negative.
    ///
    /// Returns None if the product does not exist.
    async fn set_stock(&self, id: ProductId, on_hand: u32) -> Result<Option<Product>>;

    /// Sets a product's lifecycle status. Returns None if it does not exist.
    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Option<Product>>;

    // -- Carts --

    /// Fetches a shopper's cart, creating an empty one on first access.
    async fn cart(&self, owner: ShopperId) -> Result<Cart>;

    /// Adds `quantity` of a product, summing with any existing entry.
    async fn add_cart_item(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart>;

    /// Sets a product's quantity in the cart; 0 removes the item.
    async fn set_cart_item_quantity(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart>;

    /// Removes a product from the cart.
    async fn remove_cart_item(&self, owner: ShopperId, product_id: ProductId) -> Result<Cart>;

    /// Empties the cart, preserving the record. Idempotent.
    async fn clear_cart(&self, owner: ShopperId) -> Result<Cart>;

    /// Merges a guest's cart into a registered shopper's cart.
    ///
    /// Quantities for shared products are summed and the guest cart is
    /// deleted. A no-op when the guest cart is absent or empty. Returns the
    /// registered shopper's cart.
    async fn merge_guest_cart(&self, guest: ShopperId, registered: ShopperId) -> Result<Cart>;

    // -- Orders --

    /// Fetches an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a shopper's orders, newest first.
    async fn orders_for_shopper(
        &self,
        shopper: ShopperId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>>;

    /// Lists orders containing at least one line from the given supplier.
    ///
    /// Whole orders are returned; narrowing to only that supplier's lines is
    /// a presentation concern.
    async fn orders_for_supplier(
        &self,
        supplier: SupplierId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>>;

    /// Lists all orders (privileged), newest first.
    async fn orders(
        &self,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>>;

    /// Persists an order status without validity checking.
    ///
    /// Whether the transition is legal is decided upstream by the status
    /// workflow; this is the raw write. Returns None if the order does not
    /// exist.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>>;

    // -- Checkout --

    /// Opens the transactional session used by order creation.
    async fn begin_checkout(&self) -> Result<Self::Checkout>;
}

/// The transactional primitive set used by the order creation engine.
///
/// Every read and write happens against the same isolation boundary:
/// nothing is visible to other requests until [`commit`](Self::commit), and
/// dropping the handle without committing rolls back everything, so a failed
/// checkout can never leave a partial decrement or a half-written order.
///
/// [`try_decrement`](Self::try_decrement) is the oversell guard: the stock
/// check is re-evaluated against the row at write time (compare-and-swap),
/// not against what this transaction read earlier, so two checkouts racing
/// for the last units cannot both win even if the store let them both read
/// the pre-decrement count.
#[async_trait]
pub trait CheckoutTx: Send {
    /// Fetches the referenced products, restricted to `active` status.
    async fn active_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Conditionally decrements stock for one product.
    ///
    /// Succeeds only if the product is still `active` and has at least
    /// `quantity` on hand at write time; returns false (changing nothing)
    /// otherwise.
    async fn try_decrement(&mut self, id: ProductId, quantity: u32) -> Result<bool>;

    /// Stages the order for insertion.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Empties the purchaser's cart, preserving the record.
    async fn clear_cart(&mut self, owner: ShopperId) -> Result<()>;

    /// Commits the transaction, making all staged changes visible at once.
    async fn commit(self) -> Result<()>;
}
