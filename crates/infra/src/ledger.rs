//! Inventory ledger: quantity-on-hand per product per location.
//!
//! Every operation is one unit of work on the injected store. The `*_in`
//! helpers run on a caller's transaction so checkout can deduct stock inside
//! the same unit that persists the order.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use orderflow_catalog::{CreateProduct, Product};
use orderflow_core::{
    AggregateRoot, DomainError, ExpectedVersion, LocationId, Money, ProductId,
};
use orderflow_inventory::{
    LocationLevel, StockDirection, StockItem, StockLevels, StockLocation, plan_deduction,
    total_available,
};

use crate::store::{CommerceStore, StoreError, StoreTransaction};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inventory ledger over an injected store.
#[derive(Debug)]
pub struct InventoryLedger<S> {
    store: Arc<S>,
    default_location: String,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            default_location: self.default_location.clone(),
        }
    }
}

impl<S: CommerceStore> InventoryLedger<S> {
    /// `default_location` names the location new products are provisioned at.
    pub fn new(store: Arc<S>, default_location: impl Into<String>) -> Self {
        Self {
            store,
            default_location: default_location.into(),
        }
    }

    /// Sum of on-hand quantity across all locations. Untracked products have 0.
    pub async fn total_available(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        let items = tx.stock_items_for_product(product_id, false).await?;
        Ok(total_available(&items)?)
    }

    /// Quantity at one location; 0 when the pair is not tracked.
    pub async fn quantity_at(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .stock_item(product_id, location_id)
            .await?
            .map(|item| item.quantity())
            .unwrap_or(0))
    }

    #[instrument(skip(self), err)]
    pub async fn add(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
    ) -> Result<StockItem, LedgerError> {
        let mut tx = self.store.begin().await?;
        let item = add_in(&mut tx, product_id, location_id, qty).await?;
        tx.commit().await?;
        Ok(item)
    }

    #[instrument(skip(self), err)]
    pub async fn remove(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
    ) -> Result<StockItem, LedgerError> {
        let mut tx = self.store.begin().await?;
        let item = remove_in(&mut tx, product_id, location_id, qty).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Manual adjustment: checks that the product and location exist, then adds
    /// or removes `qty`.
    #[instrument(skip(self), err)]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        direction: StockDirection,
    ) -> Result<StockItem, LedgerError> {
        if qty < 0 {
            return Err(DomainError::validation("quantity cannot be negative").into());
        }

        let mut tx = self.store.begin().await?;
        if tx.active_product(product_id).await?.is_none() {
            return Err(LedgerError::NotFound(format!("product {product_id}")));
        }
        if tx.location(location_id).await?.is_none() {
            return Err(LedgerError::NotFound(format!("location {location_id}")));
        }

        let item = match direction {
            StockDirection::Increase => add_in(&mut tx, product_id, location_id, qty).await?,
            StockDirection::Decrease => remove_in(&mut tx, product_id, location_id, qty).await?,
        };
        tx.commit().await?;

        info!(
            %product_id,
            %location_id,
            ?direction,
            qty,
            quantity = item.quantity(),
            "stock adjusted"
        );
        Ok(item)
    }

    /// Per-location breakdown and total.
    pub async fn stock_levels(&self, product_id: ProductId) -> Result<StockLevels, LedgerError> {
        let mut tx = self.store.begin().await?;
        if tx.product_including_deleted(product_id).await?.is_none() {
            return Err(LedgerError::NotFound(format!("product {product_id}")));
        }

        let items = tx.stock_items_for_product(product_id, false).await?;
        let mut locations = Vec::with_capacity(items.len());
        for item in items {
            let location_name = tx
                .location(item.location_id())
                .await?
                .map(|l| l.name().to_string())
                .unwrap_or_default();
            locations.push(LocationLevel {
                location_id: item.location_id(),
                location_name,
                quantity: item.quantity(),
            });
        }
        Ok(StockLevels::new(product_id, locations)?)
    }

    /// Insert a product and its zero-quantity stock row at the default location.
    ///
    /// The default location is created on first use.
    #[instrument(skip(self, cmd), fields(sku = %cmd.sku), err)]
    pub async fn register_product(&self, cmd: CreateProduct) -> Result<Product, LedgerError> {
        let product = Product::create(&cmd)?;

        let mut tx = self.store.begin().await?;
        let location = match tx.location_by_name(&self.default_location).await? {
            Some(location) => location,
            None => {
                let location = StockLocation::new(LocationId::new(), self.default_location.clone())?;
                tx.insert_location(&location).await?;
                location
            }
        };

        tx.insert_product(&product).await.map_err(|e| match e {
            StoreError::Constraint(_) => StoreError::Constraint(format!(
                "SKU '{}' is already in use",
                product.sku()
            )),
            other => other,
        })?;
        let item = StockItem::provision(product.id_typed(), location.id_typed(), Utc::now());
        tx.insert_stock_item(&item).await?;
        tx.commit().await?;

        info!(product_id = %product.id_typed(), location_id = %location.id_typed(), "product registered");
        Ok(product)
    }

    /// Tombstone a product. Existing orders keep referencing it.
    #[instrument(skip(self), err)]
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .active_product(product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("product {product_id}")))?;
        let at = Utc::now();
        product.soft_delete(at)?;
        tx.mark_product_deleted(product_id, at).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Change an active product's unit price. Orders already placed keep the
    /// price captured on their lines.
    #[instrument(skip(self), err)]
    pub async fn update_product_price(
        &self,
        product_id: ProductId,
        price: Money,
    ) -> Result<Product, LedgerError> {
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .active_product(product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("product {product_id}")))?;
        let previous = product.price();
        product.change_price(price)?;
        tx.update_product_price(product_id, price).await?;
        tx.commit().await?;

        info!(%product_id, %previous, %price, "product repriced");
        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn create_location(&self, name: &str) -> Result<StockLocation, LedgerError> {
        let location = StockLocation::new(LocationId::new(), name)?;
        let mut tx = self.store.begin().await?;
        tx.insert_location(&location).await?;
        tx.commit().await?;
        Ok(location)
    }
}

/// Add `qty` at a location inside `tx`, provisioning the row if absent.
pub(crate) async fn add_in<T: StoreTransaction>(
    tx: &mut T,
    product_id: ProductId,
    location_id: LocationId,
    qty: i64,
) -> Result<StockItem, LedgerError> {
    if qty < 0 {
        return Err(DomainError::validation("quantity to add cannot be negative").into());
    }

    let rows = tx.stock_items_for_product(product_id, true).await?;
    if total_available(&rows)?.checked_add(qty).is_none() {
        return Err(DomainError::validation(format!(
            "adding {qty} would put total stock of product {product_id} out of range"
        ))
        .into());
    }

    let mut item = match tx.stock_item(product_id, location_id).await? {
        Some(item) => item,
        None => {
            let item = StockItem::provision(product_id, location_id, Utc::now());
            tx.insert_stock_item(&item).await?;
            item
        }
    };

    let expected = ExpectedVersion::Exact(item.version());
    item.add(qty)?;
    tx.update_stock_item(&item, expected).await?;
    Ok(item)
}

/// Remove `qty` at a location inside `tx`, bounded by the current quantity.
pub(crate) async fn remove_in<T: StoreTransaction>(
    tx: &mut T,
    product_id: ProductId,
    location_id: LocationId,
    qty: i64,
) -> Result<StockItem, LedgerError> {
    if qty < 0 {
        return Err(DomainError::validation("quantity to remove cannot be negative").into());
    }

    let mut item = tx
        .stock_item(product_id, location_id)
        .await?
        .ok_or_else(|| DomainError::insufficient_stock(product_id, 0, qty))?;

    let expected = ExpectedVersion::Exact(item.version());
    item.remove(qty)?;
    tx.update_stock_item(&item, expected).await?;
    Ok(item)
}

/// Deduct `qty` of a product from `items` (rows read under lock, creation order).
///
/// Rows in `items` are updated in place so repeated calls see earlier deductions.
pub(crate) async fn deduct_in<T: StoreTransaction>(
    tx: &mut T,
    product_id: ProductId,
    items: &mut [StockItem],
    qty: i64,
) -> Result<(), LedgerError> {
    let plan = plan_deduction(product_id, items, qty)?;
    for step in plan {
        let item = items
            .iter_mut()
            .find(|i| i.id_typed() == step.stock_item_id)
            .ok_or_else(|| LedgerError::NotFound(format!("stock row {}", step.stock_item_id)))?;
        let expected = ExpectedVersion::Exact(item.version());
        item.remove(step.quantity)?;
        tx.update_stock_item(item, expected).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn test_ledger() -> InventoryLedger<InMemoryStore> {
        InventoryLedger::new(Arc::new(InMemoryStore::new()), "Main warehouse")
    }

    fn test_product_cmd(sku: &str) -> CreateProduct {
        CreateProduct {
            product_id: ProductId::new(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price: Money::from_units(50),
        }
    }

    #[tokio::test]
    async fn register_product_provisions_zero_row_at_default_location() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();

        let levels = ledger.stock_levels(product.id_typed()).await.unwrap();
        assert_eq!(levels.total, 0);
        assert_eq!(levels.locations.len(), 1);
        assert_eq!(levels.locations[0].location_name, "Main warehouse");
    }

    #[tokio::test]
    async fn default_location_is_reused() {
        let ledger = test_ledger();
        let a = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let b = ledger.register_product(test_product_cmd("B")).await.unwrap();

        let la = ledger.stock_levels(a.id_typed()).await.unwrap();
        let lb = ledger.stock_levels(b.id_typed()).await.unwrap();
        assert_eq!(la.locations[0].location_id, lb.locations[0].location_id);
    }

    #[tokio::test]
    async fn duplicate_sku_leaves_nothing_behind() {
        let ledger = test_ledger();
        ledger.register_product(test_product_cmd("A")).await.unwrap();
        let dup = test_product_cmd("A");
        let dup_id = dup.product_id;

        let err = ledger.register_product(dup).await.unwrap_err();
        match err {
            LedgerError::Store(StoreError::Constraint(msg)) => {
                assert_eq!(msg, "SKU 'A' is already in use");
            }
            other => panic!("Expected constraint violation, got {other:?}"),
        }
        assert!(matches!(
            ledger.stock_levels(dup_id).await.unwrap_err(),
            LedgerError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn add_then_remove_tracks_quantity_per_location() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let p = product.id_typed();
        let shelf = ledger.create_location("Shelf B").await.unwrap();

        ledger.add(p, shelf.id_typed(), 7).await.unwrap();
        ledger.remove(p, shelf.id_typed(), 3).await.unwrap();

        assert_eq!(ledger.quantity_at(p, shelf.id_typed()).await.unwrap(), 4);
        assert_eq!(ledger.total_available(p).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn remove_beyond_on_hand_is_insufficient_and_unchanged() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let p = product.id_typed();
        let loc = ledger.stock_levels(p).await.unwrap().locations[0].location_id;
        ledger.add(p, loc, 3).await.unwrap();

        let err = ledger.remove(p, loc, 5).await.unwrap_err();
        match err {
            LedgerError::Domain(DomainError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(ledger.quantity_at(p, loc).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn remove_from_untracked_pair_reports_zero_available() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let other = ledger.create_location("Overflow").await.unwrap();

        let err = ledger
            .remove(product.id_typed(), other.id_typed(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn adjust_stock_checks_product_and_location() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let loc = ledger.create_location("Shelf").await.unwrap();

        let err = ledger
            .adjust_stock(ProductId::new(), loc.id_typed(), 1, StockDirection::Increase)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = ledger
            .adjust_stock(product.id_typed(), LocationId::new(), 1, StockDirection::Increase)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let item = ledger
            .adjust_stock(product.id_typed(), loc.id_typed(), 4, StockDirection::Increase)
            .await
            .unwrap();
        assert_eq!(item.quantity(), 4);

        let item = ledger
            .adjust_stock(product.id_typed(), loc.id_typed(), 4, StockDirection::Decrease)
            .await
            .unwrap();
        assert_eq!(item.quantity(), 0);
    }

    #[tokio::test]
    async fn create_location_rejects_blank_name() {
        let ledger = test_ledger();
        let err = ledger.create_location("   ").await.unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn deleted_product_keeps_stock_levels_but_rejects_adjustments() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let p = product.id_typed();
        let loc = ledger.stock_levels(p).await.unwrap().locations[0].location_id;
        ledger.delete_product(p).await.unwrap();

        assert!(ledger.stock_levels(p).await.is_ok());
        let err = ledger
            .adjust_stock(p, loc, 1, StockDirection::Increase)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_that_would_overflow_product_total_is_rejected() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let p = product.id_typed();
        let main = ledger.stock_levels(p).await.unwrap().locations[0].location_id;
        let overflow = ledger.create_location("Overflow").await.unwrap();

        ledger
            .adjust_stock(p, main, i64::MAX, StockDirection::Increase)
            .await
            .unwrap();
        let err = ledger
            .adjust_stock(p, overflow.id_typed(), 1, StockDirection::Increase)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));

        assert_eq!(ledger.total_available(p).await.unwrap(), i64::MAX);
        assert_eq!(ledger.stock_levels(p).await.unwrap().total, i64::MAX);
        assert_eq!(ledger.quantity_at(p, overflow.id_typed()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_product_price_changes_active_products_only() {
        let ledger = test_ledger();
        let product = ledger.register_product(test_product_cmd("A")).await.unwrap();
        let p = product.id_typed();

        let repriced = ledger
            .update_product_price(p, Money::from_units(80))
            .await
            .unwrap();
        assert_eq!(repriced.price(), Money::from_units(80));

        ledger.delete_product(p).await.unwrap();
        let err = ledger
            .update_product_price(p, Money::from_units(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
