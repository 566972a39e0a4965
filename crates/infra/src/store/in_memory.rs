use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use orderflow_catalog::Product;
use orderflow_core::{
    AggregateRoot, CouponId, ExpectedVersion, LocationId, Money, OrderId, ProductId,
};
use orderflow_coupons::Coupon;
use orderflow_inventory::{StockItem, StockLocation};
use orderflow_sales::{Order, OrderLine, OrderStatus};

use super::{CommerceStore, StoreError, StoreTransaction};

#[derive(Debug, Clone)]
struct OrderHeader {
    id: OrderId,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    total: Money,
}

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    locations: Vec<StockLocation>,
    /// Creation order.
    stock: Vec<StockItem>,
    coupons: HashMap<CouponId, Coupon>,
    orders: HashMap<OrderId, OrderHeader>,
    order_lines: Vec<OrderLine>,
    order_coupons: Vec<(OrderId, CouponId)>,
}

/// In-memory store.
///
/// Intended for tests/dev. A transaction holds the store-wide lock from
/// `begin` until it is committed or dropped, so units of work run one at a
/// time. Writes go to a staged copy that replaces the live state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_order_line_insert_at: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` (1-based) order line insert of every following
    /// transaction fail with a backend error. `0` disables the fault.
    pub fn fail_order_line_insert_at(&self, nth: usize) {
        self.fail_order_line_insert_at.store(nth, Ordering::SeqCst);
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(InMemoryTransaction {
            guard,
            staged,
            fail_line_at: self.fail_order_line_insert_at.load(Ordering::SeqCst),
            lines_inserted: 0,
        })
    }
}

/// Unit of work over [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: State,
    fail_line_at: usize,
    lines_inserted: usize,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn active_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self
            .staged
            .products
            .get(&id)
            .filter(|p| p.is_active())
            .cloned())
    }

    async fn product_including_deleted(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let products = &mut self.staged.products;
        if products.contains_key(&product.id_typed()) {
            return Err(StoreError::Constraint(format!(
                "product {} already exists",
                product.id_typed()
            )));
        }
        if products.values().any(|p| p.sku() == product.sku()) {
            return Err(StoreError::Constraint(format!(
                "SKU '{}' is already in use",
                product.sku()
            )));
        }
        products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn mark_product_deleted(
        &mut self,
        id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product
            .soft_delete(at)
            .map_err(|e| StoreError::Constraint(e.to_string()))
    }

    async fn update_product_price(
        &mut self,
        id: ProductId,
        price: Money,
    ) -> Result<(), StoreError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .filter(|p| p.is_active())
            .ok_or_else(|| StoreError::NotFound(format!("active product {id}")))?;
        product
            .change_price(price)
            .map_err(|e| StoreError::Constraint(e.to_string()))
    }

    async fn location(&mut self, id: LocationId) -> Result<Option<StockLocation>, StoreError> {
        Ok(self
            .staged
            .locations
            .iter()
            .find(|l| l.id_typed() == id)
            .cloned())
    }

    async fn location_by_name(&mut self, name: &str) -> Result<Option<StockLocation>, StoreError> {
        Ok(self
            .staged
            .locations
            .iter()
            .find(|l| l.name() == name)
            .cloned())
    }

    async fn insert_location(&mut self, location: &StockLocation) -> Result<(), StoreError> {
        if self
            .staged
            .locations
            .iter()
            .any(|l| l.id_typed() == location.id_typed() || l.name() == location.name())
        {
            return Err(StoreError::Constraint(format!(
                "location '{}' already exists",
                location.name()
            )));
        }
        self.staged.locations.push(location.clone());
        Ok(())
    }

    async fn stock_items_for_product(
        &mut self,
        product_id: ProductId,
        _for_update: bool,
    ) -> Result<Vec<StockItem>, StoreError> {
        Ok(self
            .staged
            .stock
            .iter()
            .filter(|s| s.product_id() == product_id)
            .cloned()
            .collect())
    }

    async fn stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        Ok(self
            .staged
            .stock
            .iter()
            .find(|s| s.product_id() == product_id && s.location_id() == location_id)
            .cloned())
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<(), StoreError> {
        if !self.staged.products.contains_key(&item.product_id()) {
            return Err(StoreError::Constraint(format!(
                "stock row references unknown product {}",
                item.product_id()
            )));
        }
        if !self
            .staged
            .locations
            .iter()
            .any(|l| l.id_typed() == item.location_id())
        {
            return Err(StoreError::Constraint(format!(
                "stock row references unknown location {}",
                item.location_id()
            )));
        }
        if self.staged.stock.iter().any(|s| {
            s.product_id() == item.product_id() && s.location_id() == item.location_id()
        }) {
            return Err(StoreError::Constraint(format!(
                "stock row for product {} at location {} already exists",
                item.product_id(),
                item.location_id()
            )));
        }
        self.staged.stock.push(item.clone());
        Ok(())
    }

    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        if item.quantity() < 0 {
            return Err(StoreError::Constraint(format!(
                "stock row {} cannot go negative",
                item.id_typed()
            )));
        }
        let row = self
            .staged
            .stock
            .iter_mut()
            .find(|s| s.id_typed() == item.id_typed())
            .ok_or_else(|| StoreError::NotFound(format!("stock row {}", item.id_typed())))?;
        if !expected.matches(row.version()) {
            return Err(StoreError::Concurrency(format!(
                "stock row {} is at version {}, expected {expected:?}",
                item.id_typed(),
                row.version()
            )));
        }
        *row = item.clone();
        Ok(())
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self
            .staged
            .coupons
            .values()
            .find(|c| c.code() == code)
            .cloned())
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<(), StoreError> {
        if self
            .staged
            .coupons
            .values()
            .any(|c| c.code() == coupon.code() || c.id_typed() == coupon.id_typed())
        {
            return Err(StoreError::Constraint(format!(
                "coupon code '{}' is already in use",
                coupon.code()
            )));
        }
        self.staged.coupons.insert(coupon.id_typed(), coupon.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.staged.orders.contains_key(&order.id_typed()) {
            return Err(StoreError::Constraint(format!(
                "order {} already exists",
                order.id_typed()
            )));
        }
        self.staged.orders.insert(
            order.id_typed(),
            OrderHeader {
                id: order.id_typed(),
                created_at: order.created_at(),
                status: order.status(),
                total: order.total(),
            },
        );
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        self.lines_inserted += 1;
        if self.fail_line_at != 0 && self.lines_inserted == self.fail_line_at {
            return Err(StoreError::Backend(format!(
                "injected failure on order line insert #{}",
                self.lines_inserted
            )));
        }
        if !self.staged.orders.contains_key(&line.order_id) {
            return Err(StoreError::Constraint(format!(
                "order line references unknown order {}",
                line.order_id
            )));
        }
        self.staged.order_lines.push(line.clone());
        Ok(())
    }

    async fn insert_order_coupon(
        &mut self,
        order_id: OrderId,
        coupon_id: CouponId,
    ) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&order_id) {
            return Err(StoreError::Constraint(format!(
                "coupon link references unknown order {order_id}"
            )));
        }
        if !self.staged.coupons.contains_key(&coupon_id) {
            return Err(StoreError::Constraint(format!(
                "coupon link references unknown coupon {coupon_id}"
            )));
        }
        self.staged.order_coupons.push((order_id, coupon_id));
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(header) = self.staged.orders.get(&id) else {
            return Ok(None);
        };
        let lines = self
            .staged
            .order_lines
            .iter()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect();
        let coupon_ids = self
            .staged
            .order_coupons
            .iter()
            .filter(|(o, _)| *o == id)
            .map(|(_, c)| *c)
            .collect();
        Order::from_parts(
            header.id,
            header.created_at,
            header.status,
            header.total,
            lines,
            coupon_ids,
        )
        .map(Some)
        .map_err(|e| StoreError::Backend(format!("corrupt order {id}: {e}")))
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        if self.staged.orders.remove(&id).is_none() {
            return Ok(false);
        }
        self.staged.order_lines.retain(|l| l.order_id != id);
        self.staged.order_coupons.retain(|(o, _)| *o != id);
        Ok(true)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_catalog::CreateProduct;

    fn test_product(sku: &str) -> Product {
        Product::create(&CreateProduct {
            product_id: ProductId::new(),
            sku: sku.to_string(),
            name: "Widget".to_string(),
            price: Money::from_units(10),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();
        let product = test_product("SKU-1");

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.active_product(product.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let product = test_product("SKU-1");

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.active_product(product.id_typed()).await.unwrap(), Some(product));
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_constraint_violation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&test_product("SKU-1")).await.unwrap();
        let err = tx.insert_product(&test_product("SKU-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn soft_deleted_product_is_hidden_from_active_reads() {
        let store = InMemoryStore::new();
        let product = test_product("SKU-1");
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.mark_product_deleted(product.id_typed(), Utc::now())
            .await
            .unwrap();

        assert!(tx.active_product(product.id_typed()).await.unwrap().is_none());
        let historical = tx
            .product_including_deleted(product.id_typed())
            .await
            .unwrap()
            .unwrap();
        assert!(!historical.is_active());
    }

    #[tokio::test]
    async fn stale_stock_version_is_rejected() {
        let store = InMemoryStore::new();
        let product = test_product("SKU-1");
        let location = StockLocation::new(LocationId::new(), "Main").unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.insert_location(&location).await.unwrap();
        let mut item = StockItem::provision(product.id_typed(), location.id_typed(), Utc::now());
        tx.insert_stock_item(&item).await.unwrap();

        item.add(5).unwrap();
        tx.update_stock_item(&item, ExpectedVersion::Exact(0))
            .await
            .unwrap();

        let err = tx
            .update_stock_item(&item, ExpectedVersion::Exact(0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }
}
