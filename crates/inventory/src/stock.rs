use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{
    AggregateRoot, DomainError, DomainResult, LocationId, ProductId, StockItemId,
};

use crate::allocation::checked_total;

/// Quantity-on-hand of one product at one location.
///
/// Each successful `add`/`remove` bumps `version`; stores use the version read
/// before the mutation as the compare-and-swap expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: StockItemId,
    product_id: ProductId,
    location_id: LocationId,
    quantity: i64,
    version: u64,
    created_at: DateTime<Utc>,
}

impl StockItem {
    /// New tracked row with zero quantity.
    pub fn provision(product_id: ProductId, location_id: LocationId, at: DateTime<Utc>) -> Self {
        Self {
            id: StockItemId::new(),
            product_id,
            location_id,
            quantity: 0,
            version: 0,
            created_at: at,
        }
    }

    /// Rebuild a row from persisted columns.
    pub fn from_parts(
        id: StockItemId,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stock row {id} has negative quantity {quantity}"
            )));
        }
        Ok(Self {
            id,
            product_id,
            location_id,
            quantity,
            version,
            created_at,
        })
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn add(&mut self, qty: i64) -> DomainResult<()> {
        if qty < 0 {
            return Err(DomainError::validation("quantity to add cannot be negative"));
        }
        let next = self
            .quantity
            .checked_add(qty)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
        self.quantity = next;
        self.version += 1;
        Ok(())
    }

    /// Subtract `qty`, bounded by the current quantity.
    ///
    /// On failure the row is left untouched.
    pub fn remove(&mut self, qty: i64) -> DomainResult<()> {
        if qty < 0 {
            return Err(DomainError::validation("quantity to remove cannot be negative"));
        }
        if self.quantity - qty < 0 {
            return Err(DomainError::insufficient_stock(
                self.product_id,
                self.quantity,
                qty,
            ));
        }
        self.quantity -= qty;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Direction of a manual stock adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    Increase,
    Decrease,
}

/// Per-location breakdown of a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub product_id: ProductId,
    pub locations: Vec<LocationLevel>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationLevel {
    pub location_id: LocationId,
    pub location_name: String,
    pub quantity: i64,
}

impl StockLevels {
    pub fn new(product_id: ProductId, locations: Vec<LocationLevel>) -> DomainResult<Self> {
        let total = checked_total(locations.iter().map(|l| l.quantity))?;
        Ok(Self {
            product_id,
            locations,
            total,
        })
    }
}
