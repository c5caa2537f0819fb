//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and are ignored by default
//! because they need a Docker daemon. Run with:
//!
//! ```bash
//! cargo test -p market-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, ProductId, ShopperId, SupplierId};
use market_store::{
    Address, CheckoutTx, MarketStore, NewProduct, Order, OrderLine, OrderStatus, PageRequest,
    PostgresStore, Pricing, Product, ProductFilter, ProductStatus,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for the schema
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products, carts, cart_items, orders, order_lines")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn new_product(on_hand: u32, selling_cents: i64) -> NewProduct {
    NewProduct {
        supplier_id: SupplierId::new(),
        name: "Widget".into(),
        description: Some("A widget".into()),
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
#[ignore = "requires Docker"]
async fn product_roundtrip_and_listing() {
    let store = get_test_store().await;

    let product = store.insert_product(new_product(5, 2000)).await.unwrap();
    let fetched = store.product(product.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Widget");
    assert_eq!(fetched.on_hand, 5);
    assert_eq!(fetched.pricing.selling.cents(), 2000);
    assert_eq!(fetched.pricing.cost, Some(Money::from_cents(1000)));

    let mut draft = new_product(1, 100);
    draft.status = ProductStatus::Draft;
    store.insert_product(draft).await.unwrap();

    let page = store
        .active_products(ProductFilter::default(), PageRequest::first())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let filtered = store
        .active_products(
            ProductFilter {
                supplier: Some(product.supplier_id),
            },
            PageRequest::first(),
        )
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);

    let updated = store.set_stock(product.id, 42).await.unwrap().unwrap();
    assert_eq!(updated.on_hand, 42);
    let archived = store
        .set_product_status(product.id, ProductStatus::Archived)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(archived.status, ProductStatus::Archived);
    assert!(store.set_stock(ProductId::new(), 1).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn conditional_decrement_enforces_the_floor() {
    let store = get_test_store().await;
    let product = store.insert_product(new_product(2, 1000)).await.unwrap();

    let mut tx = store.begin_checkout().await.unwrap();
    assert!(tx.try_decrement(product.id, 2).await.unwrap());
    assert!(!tx.try_decrement(product.id, 1).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn checkout_transaction_commits_atomically() {
    let store = get_test_store().await;
    let product = store.insert_product(new_product(5, 2000)).await.unwrap();
    let shopper = ShopperId::new();
    store.add_cart_item(shopper, product.id, 2).await.unwrap();

    let order = Order::new(shopper, vec![line_for(&product, 2)], address());
    let mut tx = store.begin_checkout().await.unwrap();
    assert!(tx.try_decrement(product.id, 2).await.unwrap());
    tx.insert_order(&order).await.unwrap();
    tx.clear_cart(shopper).await.unwrap();
    tx.commit().await.unwrap();

    let persisted = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(persisted.lines.len(), 1);
    assert_eq!(persisted.lines[0].unit_price.cents(), 2000);
    assert_eq!(persisted.totals.total.cents(), 4599);
    assert_eq!(persisted.status, OrderStatus::Pending);
    assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 3);
    assert!(store.cart(shopper).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn dropping_the_transaction_rolls_back() {
    let store = get_test_store().await;
    let product = store.insert_product(new_product(5, 2000)).await.unwrap();
    let shopper = ShopperId::new();
    store.add_cart_item(shopper, product.id, 1).await.unwrap();

    {
        let mut tx = store.begin_checkout().await.unwrap();
        assert!(tx.try_decrement(product.id, 5).await.unwrap());
        let order = Order::new(shopper, vec![line_for(&product, 5)], address());
        tx.insert_order(&order).await.unwrap();
        tx.clear_cart(shopper).await.unwrap();
        // dropped without commit
    }

    assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 5);
    assert_eq!(store.orders(PageRequest::first(), None).await.unwrap().total, 0);
    assert_eq!(store.cart(shopper).await.unwrap().total_quantity(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_decrements_cannot_oversell() {
    let store = get_test_store().await;
    let product = store.insert_product(new_product(1, 1000)).await.unwrap();

    let (a, b) = tokio::join!(
        async {
            let mut tx = store.begin_checkout().await.unwrap();
            let won = tx.try_decrement(product.id, 1).await.unwrap();
            if won {
                tx.commit().await.unwrap();
            }
            won
        },
        async {
            let mut tx = store.begin_checkout().await.unwrap();
            let won = tx.try_decrement(product.id, 1).await.unwrap();
            if won {
                tx.commit().await.unwrap();
            }
            won
        }
    );

    assert_eq!(
        [a, b].iter().filter(|&&won| won).count(),
        1,
        "exactly one transaction may take the last unit"
    );
    assert_eq!(store.product(product.id).await.unwrap().unwrap().on_hand, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn guest_cart_merge_sums_and_deletes_guest() {
    let store = get_test_store().await;
    let product = store.insert_product(new_product(10, 1000)).await.unwrap();
    let other = store.insert_product(new_product(10, 500)).await.unwrap();
    let guest = ShopperId::new();
    let registered = ShopperId::new();

    store.add_cart_item(guest, product.id, 2).await.unwrap();
    store.add_cart_item(guest, other.id, 1).await.unwrap();
    store.add_cart_item(registered, product.id, 1).await.unwrap();

    let merged = store.merge_guest_cart(guest, registered).await.unwrap();
    assert_eq!(merged.item(product.id).unwrap().quantity, 3);
    assert_eq!(merged.item(other.id).unwrap().quantity, 1);

    assert!(store.cart(guest).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn supplier_listing_matches_line_membership() {
    let store = get_test_store().await;
    let mine = store.insert_product(new_product(10, 1000)).await.unwrap();
    let theirs = store.insert_product(new_product(10, 1000)).await.unwrap();

    let with_mine = Order::new(
        ShopperId::new(),
        vec![line_for(&mine, 1), line_for(&theirs, 1)],
        address(),
    );
    let without_mine = Order::new(ShopperId::new(), vec![line_for(&theirs, 2)], address());
    for order in [&with_mine, &without_mine] {
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(order).await.unwrap();
        tx.commit().await.unwrap();
    }

    let page = store
        .orders_for_supplier(mine.supplier_id, PageRequest::first(), None)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, with_mine.id);
    // Whole orders come back, including the other supplier's lines.
    assert_eq!(page.items[0].lines.len(), 2);

    let pending = store
        .orders_for_shopper(with_mine.shopper_id, PageRequest::first(), Some(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.total, 1);

    let updated = store
        .set_order_status(with_mine.id, OrderStatus::Processing)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);
}
