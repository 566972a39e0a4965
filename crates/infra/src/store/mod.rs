//! Transactional storage boundary.
//!
//! Every service operation runs inside one [`StoreTransaction`]: reads, locks
//! and writes staged on the transaction become visible only on
//! [`StoreTransaction::commit`]. Dropping a transaction without committing
//! rolls it back.
//!
//! Two backends implement it:
//! - [`InMemoryStore`]: tests/dev; serializes transactions behind an async mutex.
//! - [`PostgresStore`]: row locks (`SELECT … FOR UPDATE`) plus compare-and-swap
//!   updates on the stock row version.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderflow_catalog::Product;
use orderflow_core::{CouponId, ExpectedVersion, LocationId, Money, OrderId, ProductId};
use orderflow_coupons::Coupon;
use orderflow_inventory::{StockItem, StockLocation};
use orderflow_sales::{Order, OrderLine};

pub mod in_memory;
pub mod postgres;
pub mod schema;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage failure.
///
/// These are infrastructure errors as opposed to domain errors (validation,
/// invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness, foreign-key or check constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A compare-and-swap found a different row version.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// The row to update or delete does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Connection, decoding or other backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Factory for units of work.
#[async_trait]
pub trait CommerceStore: Send + Sync + 'static {
    type Tx: StoreTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One unit of work against the store.
#[async_trait]
pub trait StoreTransaction: Send {
    // Catalog

    /// Product by id, excluding soft-deleted products.
    async fn active_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Product by id, tombstoned or not. Used for historical reads.
    async fn product_including_deleted(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn mark_product_deleted(
        &mut self,
        id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Set the unit price of an active product. Order lines keep their own copy.
    async fn update_product_price(
        &mut self,
        id: ProductId,
        price: Money,
    ) -> Result<(), StoreError>;

    // Locations

    async fn location(&mut self, id: LocationId) -> Result<Option<StockLocation>, StoreError>;

    async fn location_by_name(&mut self, name: &str) -> Result<Option<StockLocation>, StoreError>;

    async fn insert_location(&mut self, location: &StockLocation) -> Result<(), StoreError>;

    // Stock

    /// All stock rows of a product in row creation order.
    ///
    /// With `for_update` the rows stay locked until the transaction ends.
    async fn stock_items_for_product(
        &mut self,
        product_id: ProductId,
        for_update: bool,
    ) -> Result<Vec<StockItem>, StoreError>;

    /// The row for one (product, location) pair, locked until the transaction ends.
    async fn stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError>;

    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<(), StoreError>;

    /// Write `item`'s quantity and version if the stored version still matches `expected`.
    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // Coupons

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, StoreError>;

    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<(), StoreError>;

    // Orders

    /// Insert the order header. Lines and coupon links are inserted separately.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError>;

    async fn insert_order_coupon(
        &mut self,
        order_id: OrderId,
        coupon_id: CouponId,
    ) -> Result<(), StoreError>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Delete an order with its lines and coupon links. Returns whether it existed.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
