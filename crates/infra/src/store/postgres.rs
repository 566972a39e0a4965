//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / network / decode | N/A | `Backend` |
//!
//! ## Locking
//!
//! Stock reads inside a checkout use `SELECT … FOR UPDATE`; stock writes are
//! compare-and-swap on `version`. A CAS that touches no row is reported as
//! `Concurrency`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use orderflow_catalog::Product;
use orderflow_core::{
    AggregateRoot, CouponId, ExpectedVersion, LocationId, Money, OrderId, OrderLineId, ProductId,
    StockItemId,
};
use orderflow_coupons::{Coupon, CouponDiscount, CouponKind};
use orderflow_inventory::{StockItem, StockLocation};
use orderflow_sales::{Order, OrderLine, OrderStatus};

use super::schema;
use super::{CommerceStore, StoreError, StoreTransaction};

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply the schema.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.apply_schema().await?;
        Ok(store)
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in schema::ALL {
            sqlx::raw_sql(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("apply_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction {
            tx,
            next_line_no: HashMap::new(),
        })
    }
}

/// Unit of work over one Postgres transaction. Dropping it rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    next_line_no: HashMap<OrderId, i32>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn active_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, price_cents, deleted_at
            FROM products
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("active_product", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    async fn product_including_deleted(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, price_cents, deleted_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("product_including_deleted", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, deleted_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(cents_to_db(product.price())?)
        .bind(product.deleted_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn mark_product_deleted(
        &mut self,
        id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products SET deleted_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("mark_product_deleted", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("active product {id}")));
        }
        Ok(())
    }

    async fn update_product_price(
        &mut self,
        id: ProductId,
        price: Money,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products SET price_cents = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(cents_to_db(price)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product_price", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("active product {id}")));
        }
        Ok(())
    }

    async fn location(&mut self, id: LocationId) -> Result<Option<StockLocation>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM stock_locations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("location", e))?;

        row.map(|r| location_from_row(&r)).transpose()
    }

    async fn location_by_name(&mut self, name: &str) -> Result<Option<StockLocation>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM stock_locations WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("location_by_name", e))?;

        row.map(|r| location_from_row(&r)).transpose()
    }

    async fn insert_location(&mut self, location: &StockLocation) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO stock_locations (id, name) VALUES ($1, $2)")
            .bind(location.id_typed().as_uuid())
            .bind(location.name())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn stock_items_for_product(
        &mut self,
        product_id: ProductId,
        for_update: bool,
    ) -> Result<Vec<StockItem>, StoreError> {
        let sql = if for_update {
            r#"
            SELECT id, product_id, location_id, quantity, version, created_at
            FROM stock_items
            WHERE product_id = $1
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, product_id, location_id, quantity, version, created_at
            FROM stock_items
            WHERE product_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        };

        let rows = sqlx::query(sql)
            .bind(product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("stock_items_for_product", e))?;

        rows.iter().map(stock_item_from_row).collect()
    }

    async fn stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, location_id, quantity, version, created_at
            FROM stock_items
            WHERE product_id = $1 AND location_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_item", e))?;

        row.map(|r| stock_item_from_row(&r)).transpose()
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (id, product_id, location_id, quantity, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(item.product_id().as_uuid())
        .bind(item.location_id().as_uuid())
        .bind(item.quantity())
        .bind(item.version() as i64)
        .bind(item.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_item", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, item),
        fields(stock_item_id = %item.id_typed(), quantity = item.quantity()),
        err
    )]
    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let result = match expected {
            ExpectedVersion::Exact(v) => sqlx::query(
                r#"
                UPDATE stock_items SET quantity = $2, version = $3
                WHERE id = $1 AND version = $4
                "#,
            )
            .bind(item.id_typed().as_uuid())
            .bind(item.quantity())
            .bind(item.version() as i64)
            .bind(v as i64)
            .execute(&mut *self.tx)
            .await,
            ExpectedVersion::Any => sqlx::query(
                "UPDATE stock_items SET quantity = $2, version = $3 WHERE id = $1",
            )
            .bind(item.id_typed().as_uuid())
            .bind(item.quantity())
            .bind(item.version() as i64)
            .execute(&mut *self.tx)
            .await,
        }
        .map_err(|e| map_sqlx_error("update_stock_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Concurrency(format!(
                "stock row {} changed since it was read (expected {expected:?})",
                item.id_typed()
            )));
        }
        Ok(())
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, code, kind, value, expiry_date, active
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("coupon_by_code", e))?;

        row.map(|r| coupon_from_row(&r)).transpose()
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<(), StoreError> {
        let discount = coupon.discount();
        let value = i64::try_from(discount.raw_value())
            .map_err(|_| StoreError::Constraint("coupon value out of range".to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, kind, value, expiry_date, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(coupon.id_typed().as_uuid())
        .bind(coupon.code())
        .bind(discount.kind().as_str())
        .bind(value)
        .bind(coupon.expiry_date())
        .bind(coupon.is_active())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_coupon", e))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, created_at, status, total_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.created_at())
        .bind(order.status().as_str())
        .bind(cents_to_db(order.total())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        let line_no = {
            let n = self.next_line_no.entry(line.order_id).or_insert(0);
            *n += 1;
            *n
        };

        sqlx::query(
            r#"
            INSERT INTO order_lines (id, order_id, line_no, product_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line_no)
        .bind(line.product_id.as_uuid())
        .bind(line.quantity)
        .bind(cents_to_db(line.unit_price)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        Ok(())
    }

    async fn insert_order_coupon(
        &mut self,
        order_id: OrderId,
        coupon_id: CouponId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO order_coupons (order_id, coupon_id) VALUES ($1, $2)")
            .bind(order_id.as_uuid())
            .bind(coupon_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_coupon", e))?;
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(header) = sqlx::query(
            "SELECT id, created_at, status, total_cents FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order", e))?
        else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order_lines", e))?;

        let coupon_rows = sqlx::query("SELECT coupon_id FROM order_coupons WHERE order_id = $1")
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("order_coupons", e))?;

        let lines = line_rows
            .iter()
            .map(order_line_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let coupon_ids = coupon_rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("coupon_id").map(CouponId::from_uuid))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_order_coupon", e))?;

        let status: String = header.try_get("status").map_err(decode_error)?;
        let total: i64 = header.try_get("total_cents").map_err(decode_error)?;

        Order::from_parts(
            OrderId::from_uuid(header.try_get("id").map_err(decode_error)?),
            header.try_get("created_at").map_err(decode_error)?,
            OrderStatus::parse(&status).map_err(|e| StoreError::Backend(e.to_string()))?,
            cents_from_db(total)?,
            lines,
            coupon_ids,
        )
        .map(Some)
        .map_err(|e| StoreError::Backend(format!("corrupt order {id}: {e}")))
    }

    #[instrument(skip(self), err)]
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // unique, foreign key, check
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn cents_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Constraint(format!("amount {money} out of range")))
}

fn cents_from_db(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Backend(format!("negative amount {cents} in storage")))
}

// Row mapping

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let price: i64 = row.try_get("price_cents").map_err(decode_error)?;
    Ok(Product::from_parts(
        ProductId::from_uuid(row.try_get("id").map_err(decode_error)?),
        row.try_get("sku").map_err(decode_error)?,
        row.try_get("name").map_err(decode_error)?,
        cents_from_db(price)?,
        row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")
            .map_err(decode_error)?,
    ))
}

fn location_from_row(row: &PgRow) -> Result<StockLocation, StoreError> {
    let name: String = row.try_get("name").map_err(decode_error)?;
    StockLocation::new(
        LocationId::from_uuid(row.try_get("id").map_err(decode_error)?),
        name,
    )
    .map_err(|e| StoreError::Backend(e.to_string()))
}

fn stock_item_from_row(row: &PgRow) -> Result<StockItem, StoreError> {
    let version: i64 = row.try_get("version").map_err(decode_error)?;
    StockItem::from_parts(
        StockItemId::from_uuid(row.try_get("id").map_err(decode_error)?),
        ProductId::from_uuid(row.try_get("product_id").map_err(decode_error)?),
        LocationId::from_uuid(row.try_get("location_id").map_err(decode_error)?),
        row.try_get("quantity").map_err(decode_error)?,
        version as u64,
        row.try_get("created_at").map_err(decode_error)?,
    )
    .map_err(|e| StoreError::Backend(e.to_string()))
}

fn coupon_from_row(row: &PgRow) -> Result<Coupon, StoreError> {
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    let value: i64 = row.try_get("value").map_err(decode_error)?;
    let kind = CouponKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?;
    let value = u64::try_from(value)
        .map_err(|_| StoreError::Backend(format!("negative coupon value {value}")))?;
    let discount =
        CouponDiscount::from_raw(kind, value).map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(Coupon::from_parts(
        CouponId::from_uuid(row.try_get("id").map_err(decode_error)?),
        row.try_get("code").map_err(decode_error)?,
        discount,
        row.try_get::<NaiveDate, _>("expiry_date")
            .map_err(decode_error)?,
        row.try_get("active").map_err(decode_error)?,
    ))
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let unit_price: i64 = row.try_get("unit_price_cents").map_err(decode_error)?;
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get("id").map_err(decode_error)?),
        order_id: OrderId::from_uuid(row.try_get("order_id").map_err(decode_error)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(decode_error)?),
        quantity: row.try_get("quantity").map_err(decode_error)?,
        unit_price: cents_from_db(unit_price)?,
    })
}
