use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, ShopperId, SupplierId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    Cart, NewProduct, Order, OrderStatus, Page, PageRequest, Product, ProductFilter,
    ProductStatus, Result,
    store::{CheckoutTx, MarketStore},
};

#[derive(Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<ShopperId, Cart>,
    orders: Vec<Order>,
}

/// In-memory marketplace store.
///
/// Holds everything behind one `RwLock` and provides the same interface and
/// transactional guarantees as the PostgreSQL implementation. Used by the
/// test suites and by database-less runs of the API server.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

fn paginate<T: Clone>(all: Vec<T>, page: PageRequest) -> Page<T> {
    let total = all.len() as u64;
    let start = usize::try_from(page.offset()).unwrap_or(usize::MAX).min(all.len());
    let end = (start + page.per_page() as usize).min(all.len());
    Page::new(all[start..end].to_vec(), total, page)
}

fn order_page(
    state: &State,
    page: PageRequest,
    status: Option<OrderStatus>,
    mut keep: impl FnMut(&Order) -> bool,
) -> Page<Order> {
    // Orders are appended in creation order, so newest-first is a reverse scan.
    let matching: Vec<Order> = state
        .orders
        .iter()
        .rev()
        .filter(|o| status.is_none_or(|s| o.status == s))
        .filter(|&o| keep(o))
        .cloned()
        .collect();
    paginate(matching, page)
}

#[async_trait]
impl MarketStore for InMemoryStore {
    type Checkout = MemoryCheckout;

    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let product = new.into_product();
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn active_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let state = self.state.read().await;
        let mut matching: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.status == ProductStatus::Active)
            .filter(|p| filter.supplier.is_none_or(|s| p.supplier_id == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn set_stock(&self, id: ProductId, on_hand: u32) -> Result<Option<Product>> {
        let mut state = self.state.write().await;
        Ok(state.products.get_mut(&id).map(|p| {
            p.on_hand = on_hand;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Option<Product>> {
        let mut state = self.state.write().await;
        Ok(state.products.get_mut(&id).map(|p| {
            p.status = status;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn cart(&self, owner: ShopperId) -> Result<Cart> {
        let mut state = self.state.write().await;
        Ok(state
            .carts
            .entry(owner)
            .or_insert_with(|| Cart::empty(owner))
            .clone())
    }

    async fn add_cart_item(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.carts.entry(owner).or_insert_with(|| Cart::empty(owner));
        cart.add(product_id, quantity);
        Ok(cart.clone())
    }

    async fn set_cart_item_quantity(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.carts.entry(owner).or_insert_with(|| Cart::empty(owner));
        cart.set_quantity(product_id, quantity);
        Ok(cart.clone())
    }

    async fn remove_cart_item(&self, owner: ShopperId, product_id: ProductId) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.carts.entry(owner).or_insert_with(|| Cart::empty(owner));
        cart.remove(product_id);
        Ok(cart.clone())
    }

    async fn clear_cart(&self, owner: ShopperId) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.carts.entry(owner).or_insert_with(|| Cart::empty(owner));
        cart.clear();
        Ok(cart.clone())
    }

    async fn merge_guest_cart(&self, guest: ShopperId, registered: ShopperId) -> Result<Cart> {
        let mut state = self.state.write().await;
        let guest_cart = state.carts.get(&guest).cloned();
        let target = state
            .carts
            .entry(registered)
            .or_insert_with(|| Cart::empty(registered));

        match guest_cart {
            Some(g) if !g.is_empty() => {
                target.absorb(&g);
                let merged = target.clone();
                state.carts.remove(&guest);
                Ok(merged)
            }
            _ => Ok(target.clone()),
        }
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn orders_for_shopper(
        &self,
        shopper: ShopperId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        let state = self.state.read().await;
        Ok(order_page(&state, page, status, |o| o.shopper_id == shopper))
    }

    async fn orders_for_supplier(
        &self,
        supplier: SupplierId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        let state = self.state.read().await;
        Ok(order_page(&state, page, status, |o| {
            o.involves_supplier(supplier)
        }))
    }

    async fn orders(
        &self,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        let state = self.state.read().await;
        Ok(order_page(&state, page, status, |_| true))
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        Ok(state.orders.iter_mut().find(|o| o.id == id).map(|o| {
            o.status = status;
            o.updated_at = Utc::now();
            o.clone()
        }))
    }

    async fn begin_checkout(&self) -> Result<Self::Checkout> {
        let guard = self.state.clone().write_owned().await;
        let staged = guard.clone();
        Ok(MemoryCheckout { guard, staged })
    }
}

/// In-memory checkout transaction.
///
/// Holds the store's write lock for its whole lifetime and mutates a staged
/// copy of the state; `commit` swaps the staged copy in atomically, dropping
/// without commit discards it. This mirrors the rollback contract of the
/// PostgreSQL transaction.
pub struct MemoryCheckout {
    guard: OwnedRwLockWriteGuard<State>,
    staged: State,
}

#[async_trait]
impl CheckoutTx for MemoryCheckout {
    async fn active_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.products.get(id))
            .filter(|p| p.status == ProductStatus::Active)
            .cloned()
            .collect())
    }

    async fn try_decrement(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        match self.staged.products.get_mut(&id) {
            Some(p) if p.status == ProductStatus::Active && p.on_hand >= quantity => {
                p.on_hand -= quantity;
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn clear_cart(&mut self, owner: ShopperId) -> Result<()> {
        if let Some(cart) = self.staged.carts.get_mut(&owner) {
            cart.clear();
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let Self { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use crate::{Address, OrderLine, Pricing};

    fn new_product(on_hand: u32, selling_cents: i64) -> NewProduct {
        NewProduct {
            supplier_id: SupplierId::new(),
            name: "Widget".into(),
            description: None,
            pricing: Pricing {
                cost: Some(Money::from_cents(selling_cents / 2)),
                selling: Money::from_cents(selling_cents),
            },
            on_hand,
            status: ProductStatus::Active,
        }
    }

    fn address() -> Address {
        Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            zip: "12345".into(),
            country: "US".into(),
        }
    }

    fn line_for(product: &Product, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.pricing.selling,
            cost_price: product.pricing.cost,
            supplier_id: product.supplier_id,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_product() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(5, 1000)).await.unwrap();

        let fetched = store.product(product.id).await.unwrap().unwrap();
        assert_eq!(fetched, product);
        assert!(store.product(ProductId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_listing_excludes_other_statuses() {
        let store = InMemoryStore::new();
        store.insert_product(new_product(1, 100)).await.unwrap();
        let mut draft = new_product(1, 100);
        draft.status = ProductStatus::Draft;
        store.insert_product(draft).await.unwrap();

        let page = store
            .active_products(ProductFilter::default(), PageRequest::first())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn active_listing_filters_by_supplier() {
        let store = InMemoryStore::new();
        let mine = store.insert_product(new_product(1, 100)).await.unwrap();
        store.insert_product(new_product(1, 100)).await.unwrap();

        let page = store
            .active_products(
                ProductFilter {
                    supplier: Some(mine.supplier_id),
                },
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, mine.id);
    }

    #[tokio::test]
    async fn set_stock_overwrites() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(5, 1000)).await.unwrap();

        let updated = store.set_stock(product.id, 42).await.unwrap().unwrap();
        assert_eq!(updated.on_hand, 42);
        assert!(store.set_stock(ProductId::new(), 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cart_is_created_lazily() {
        let store = InMemoryStore::new();
        let owner = ShopperId::new();

        let cart = store.cart(owner).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.owner, owner);
    }

    #[tokio::test]
    async fn merge_guest_cart_sums_and_deletes_guest() {
        let store = InMemoryStore::new();
        let guest = ShopperId::new();
        let registered = ShopperId::new();
        let shared = ProductId::new();

        store.add_cart_item(guest, shared, 2).await.unwrap();
        store.add_cart_item(registered, shared, 1).await.unwrap();

        let merged = store.merge_guest_cart(guest, registered).await.unwrap();
        assert_eq!(merged.item(shared).unwrap().quantity, 3);

        // Guest record is gone: a fresh access recreates an empty one.
        let guest_cart = store.cart(guest).await.unwrap();
        assert!(guest_cart.is_empty());
    }

    #[tokio::test]
    async fn merge_absent_guest_is_noop() {
        let store = InMemoryStore::new();
        let registered = ShopperId::new();
        store
            .add_cart_item(registered, ProductId::new(), 1)
            .await
            .unwrap();

        let merged = store
            .merge_guest_cart(ShopperId::new(), registered)
            .await
            .unwrap();
        assert_eq!(merged.total_quantity(), 1);
    }

    #[tokio::test]
    async fn checkout_commit_applies_staged_changes() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(5, 2000)).await.unwrap();
        let shopper = ShopperId::new();
        let order = Order::new(shopper, vec![line_for(&product, 2)], address());

        let mut tx = store.begin_checkout().await.unwrap();
        assert!(tx.try_decrement(product.id, 2).await.unwrap());
        tx.insert_order(&order).await.unwrap();
        tx.clear_cart(shopper).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 3);
        assert_eq!(store.order(order.id).await.unwrap().unwrap().id, order.id);
    }

    #[tokio::test]
    async fn dropping_checkout_rolls_back() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(5, 2000)).await.unwrap();

        {
            let mut tx = store.begin_checkout().await.unwrap();
            assert!(tx.try_decrement(product.id, 5).await.unwrap());
            // dropped without commit
        }

        assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 5);
    }

    #[tokio::test]
    async fn try_decrement_refuses_overdraw_and_inactive() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(2, 2000)).await.unwrap();
        let mut archived = new_product(10, 1000);
        archived.status = ProductStatus::Archived;
        let archived = store.insert_product(archived).await.unwrap();

        let mut tx = store.begin_checkout().await.unwrap();
        assert!(!tx.try_decrement(product.id, 3).await.unwrap());
        assert!(!tx.try_decrement(archived.id, 1).await.unwrap());
        assert!(!tx.try_decrement(ProductId::new(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn order_queries_filter_and_paginate() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(100, 1000)).await.unwrap();
        let shopper = ShopperId::new();

        for _ in 0..3 {
            let order = Order::new(shopper, vec![line_for(&product, 1)], address());
            let mut tx = store.begin_checkout().await.unwrap();
            tx.insert_order(&order).await.unwrap();
            tx.commit().await.unwrap();
        }
        let other = Order::new(ShopperId::new(), vec![line_for(&product, 1)], address());
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&other).await.unwrap();
        tx.commit().await.unwrap();

        let mine = store
            .orders_for_shopper(shopper, PageRequest::new(1, 2), None)
            .await
            .unwrap();
        assert_eq!(mine.total, 3);
        assert_eq!(mine.items.len(), 2);
        assert_eq!(mine.total_pages, 2);

        let by_supplier = store
            .orders_for_supplier(product.supplier_id, PageRequest::first(), None)
            .await
            .unwrap();
        assert_eq!(by_supplier.total, 4);

        let all = store.orders(PageRequest::first(), None).await.unwrap();
        assert_eq!(all.total, 4);

        let cancelled = store
            .orders(PageRequest::first(), Some(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(cancelled.total, 0);
    }

    #[tokio::test]
    async fn set_order_status_touches_updated_at() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product(5, 1000)).await.unwrap();
        let order = Order::new(ShopperId::new(), vec![line_for(&product, 1)], address());
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let updated = store
            .set_order_status(order.id, OrderStatus::Processing)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
        assert!(updated.updated_at >= order.updated_at);
    }
}
