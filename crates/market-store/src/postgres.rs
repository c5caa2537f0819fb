use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, ShopperId, SupplierId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Address, Cart, CartItem, NewProduct, Order, OrderLine, OrderStatus, Page, PageRequest,
    Pricing, Product, ProductFilter, ProductStatus, Result, StoreError, Totals,
    store::{CheckoutTx, MarketStore},
};

/// PostgreSQL-backed marketplace store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let status: String = row.try_get("status")?;
        let status: ProductStatus = status.parse().map_err(StoreError::Decode)?;
        let cost: Option<i64> = row.try_get("cost_cents")?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            supplier_id: SupplierId::from_uuid(row.try_get::<Uuid, _>("supplier_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            pricing: Pricing {
                cost: cost.map(Money::from_cents),
                selling: Money::from_cents(row.try_get("selling_cents")?),
            },
            on_hand: decode_count(row.try_get("on_hand")?, "on_hand")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status: OrderStatus = status.parse().map_err(StoreError::Decode)?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            shopper_id: ShopperId::from_uuid(row.try_get::<Uuid, _>("shopper_id")?),
            lines,
            shipping_address: Address {
                street: row.try_get("street")?,
                city: row.try_get("city")?,
                zip: row.try_get("zip")?,
                country: row.try_get("country")?,
            },
            totals: Totals {
                subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
                shipping: Money::from_cents(row.try_get("shipping_cents")?),
                total: Money::from_cents(row.try_get("total_cents")?),
            },
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        let cost: Option<i64> = row.try_get("cost_price_cents")?;
        Ok(OrderLine {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: decode_count(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            cost_price: cost.map(Money::from_cents),
            supplier_id: SupplierId::from_uuid(row.try_get::<Uuid, _>("supplier_id")?),
        })
    }

    /// Loads the lines for a set of orders, keyed by order id, preserving
    /// each order's line insertion order.
    async fn lines_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price_cents,
                   cost_price_cents, supplier_id
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id")?;
            by_order
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(&row)?);
        }
        Ok(by_order)
    }

    /// Shared implementation behind the three order list operations.
    ///
    /// Builds the WHERE clause dynamically; parameters are bound in the same
    /// order the placeholders are appended.
    async fn list_orders(
        &self,
        shopper: Option<ShopperId>,
        supplier: Option<SupplierId>,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let mut filter = String::new();
        let mut param_count = 0;

        if shopper.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND shopper_id = ${param_count}"));
        }
        if supplier.is_some() {
            param_count += 1;
            filter.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM order_lines l \
                 WHERE l.order_id = orders.id AND l.supplier_id = ${param_count})"
            ));
        }
        if status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders WHERE 1=1{filter}");
        let select_sql = format!(
            "SELECT id, shopper_id, street, city, zip, country, subtotal_cents, \
             shipping_cents, total_cents, status, created_at, updated_at \
             FROM orders WHERE 1=1{filter} \
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut select_query = sqlx::query(&select_sql);
        if let Some(shopper) = shopper {
            count_query = count_query.bind(shopper.as_uuid());
            select_query = select_query.bind(shopper.as_uuid());
        }
        if let Some(supplier) = supplier {
            count_query = count_query.bind(supplier.as_uuid());
            select_query = select_query.bind(supplier.as_uuid());
        }
        if let Some(status) = status {
            count_query = count_query.bind(status.as_str());
            select_query = select_query.bind(status.as_str());
        }
        select_query = select_query
            .bind(i64::from(page.per_page()))
            .bind(page.offset() as i64);

        let total: i64 = count_query.fetch_one(&self.pool).await?;
        let rows = select_query.fetch_all(&self.pool).await?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut lines = self.lines_for(&ids).await?;

        let orders = rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                Self::row_to_order(row, lines.remove(&id).unwrap_or_default())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(orders, total as u64, page))
    }

    async fn ensure_cart_row(&self, owner: ShopperId) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (owner_id, created_at, updated_at) VALUES ($1, NOW(), NOW()) \
             ON CONFLICT (owner_id) DO NOTHING",
        )
        .bind(owner.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_cart(&self, owner: ShopperId) -> Result<()> {
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}

#[async_trait]
impl MarketStore for PostgresStore {
    type Checkout = PgCheckout;

    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let product = new.into_product();
        sqlx::query(
            r#"
            INSERT INTO products (id, supplier_id, name, description, cost_cents,
                                  selling_cents, on_hand, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.supplier_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.pricing.cost.map(|m| m.cents()))
        .bind(product.pricing.selling.cents())
        .bind(i64::from(product.on_hand))
        .bind(product.status.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, supplier_id, name, description, cost_cents, selling_cents, \
             on_hand, status, created_at, updated_at FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn active_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let (count_sql, select_sql) = if filter.supplier.is_some() {
            (
                "SELECT COUNT(*) FROM products WHERE status = 'active' AND supplier_id = $1",
                "SELECT id, supplier_id, name, description, cost_cents, selling_cents, \
                 on_hand, status, created_at, updated_at FROM products \
                 WHERE status = 'active' AND supplier_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
        } else {
            (
                "SELECT COUNT(*) FROM products WHERE status = 'active'",
                "SELECT id, supplier_id, name, description, cost_cents, selling_cents, \
                 on_hand, status, created_at, updated_at FROM products \
                 WHERE status = 'active' \
                 ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
        };

        let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
        let mut select_query = sqlx::query(select_sql);
        if let Some(supplier) = filter.supplier {
            count_query = count_query.bind(supplier.as_uuid());
            select_query = select_query.bind(supplier.as_uuid());
        }
        select_query = select_query
            .bind(i64::from(page.per_page()))
            .bind(page.offset() as i64);

        let total: i64 = count_query.fetch_one(&self.pool).await?;
        let rows = select_query.fetch_all(&self.pool).await?;
        let products = rows
            .into_iter()
            .map(Self::row_to_product)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(products, total as u64, page))
    }

    async fn set_stock(&self, id: ProductId, on_hand: u32) -> Result<Option<Product>> {
        // Last-writer-wins by design; see the trait docs.
        tracing::debug!(product_id = %id, on_hand, "absolute stock set");
        let result =
            sqlx::query("UPDATE products SET on_hand = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(i64::from(on_hand))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.product(id).await
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Option<Product>> {
        let result =
            sqlx::query("UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.product(id).await
    }

    async fn cart(&self, owner: ShopperId) -> Result<Cart> {
        self.ensure_cart_row(owner).await?;

        let row = sqlx::query("SELECT created_at, updated_at FROM carts WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        let item_rows = sqlx::query(
            "SELECT product_id, quantity, added_at FROM cart_items \
             WHERE owner_id = $1 ORDER BY added_at, product_id",
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|r| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(r.try_get::<Uuid, _>("product_id")?),
                    quantity: decode_count(r.try_get("quantity")?, "quantity")?,
                    added_at: r.try_get("added_at")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart {
            owner,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn add_cart_item(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return self.cart(owner).await;
        }
        self.ensure_cart_row(owner).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (owner_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (owner_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        self.touch_cart(owner).await?;
        self.cart(owner).await
    }

    async fn set_cart_item_quantity(
        &self,
        owner: ShopperId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return self.remove_cart_item(owner, product_id).await;
        }
        self.ensure_cart_row(owner).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (owner_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (owner_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(owner.as_uuid())
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        self.touch_cart(owner).await?;
        self.cart(owner).await
    }

    async fn remove_cart_item(&self, owner: ShopperId, product_id: ProductId) -> Result<Cart> {
        self.ensure_cart_row(owner).await?;

        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(owner.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        self.touch_cart(owner).await?;
        self.cart(owner).await
    }

    async fn clear_cart(&self, owner: ShopperId) -> Result<Cart> {
        self.ensure_cart_row(owner).await?;

        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?;

        self.touch_cart(owner).await?;
        self.cart(owner).await
    }

    async fn merge_guest_cart(&self, guest: ShopperId, registered: ShopperId) -> Result<Cart> {
        let guest_items: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE owner_id = $1")
                .bind(guest.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        if guest_items == 0 {
            return self.cart(registered).await;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO carts (owner_id, created_at, updated_at) VALUES ($1, NOW(), NOW()) \
             ON CONFLICT (owner_id) DO NOTHING",
        )
        .bind(registered.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (owner_id, product_id, quantity, added_at)
            SELECT $2, product_id, quantity, added_at FROM cart_items WHERE owner_id = $1
            ON CONFLICT (owner_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(guest.as_uuid())
        .bind(registered.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(guest.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM carts WHERE owner_id = $1")
            .bind(guest.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE owner_id = $1")
            .bind(registered.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.cart(registered).await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, shopper_id, street, city, zip, country, subtotal_cents, \
             shipping_cents, total_cents, status, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut lines = self.lines_for(&[id.as_uuid()]).await?;
                let lines = lines.remove(&id.as_uuid()).unwrap_or_default();
                Ok(Some(Self::row_to_order(row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn orders_for_shopper(
        &self,
        shopper: ShopperId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        self.list_orders(Some(shopper), None, status, page).await
    }

    async fn orders_for_supplier(
        &self,
        supplier: SupplierId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        self.list_orders(None, Some(supplier), status, page).await
    }

    async fn orders(
        &self,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>> {
        self.list_orders(None, None, status, page).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.order(id).await
    }

    async fn begin_checkout(&self) -> Result<Self::Checkout> {
        Ok(PgCheckout {
            tx: self.pool.begin().await?,
        })
    }
}

/// PostgreSQL checkout transaction.
///
/// All reads and writes run on one `sqlx::Transaction`; dropping the handle
/// without committing rolls everything back.
pub struct PgCheckout {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckout {
    async fn active_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, supplier_id, name, description, cost_cents, selling_cents, \
             on_hand, status, created_at, updated_at \
             FROM products WHERE id = ANY($1) AND status = 'active'",
        )
        .bind(uuids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(PostgresStore::row_to_product).collect()
    }

    async fn try_decrement(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        // The WHERE clause re-checks stock at write time: this is the
        // compare-and-swap that makes concurrent checkouts safe.
        let result = sqlx::query(
            "UPDATE products SET on_hand = on_hand - $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'active' AND on_hand >= $2",
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, shopper_id, street, city, zip, country,
                                subtotal_cents, shipping_cents, total_cents, status,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.shopper_id.as_uuid())
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.zip)
        .bind(&order.shipping_address.country)
        .bind(order.totals.subtotal.cents())
        .bind(order.totals.shipping.cents())
        .bind(order.totals.total.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, product_name,
                                         quantity, unit_price_cents, cost_price_cents,
                                         supplier_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i64)
            .bind(line.product_id.as_uuid())
            .bind(&line.product_name)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .bind(line.cost_price.map(|m| m.cents()))
            .bind(line.supplier_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn clear_cart(&mut self, owner: ShopperId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
