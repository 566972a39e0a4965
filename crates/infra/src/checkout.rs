//! Cart operations, checkout preview and order finalization.
//!
//! Finalization is one unit of work on the store: resolve products, lock and
//! check stock, price, insert the order with its lines and coupon links, deduct
//! stock, commit. Right before the commit the session cart is taken from the
//! cart store if it still matches what was priced; a second finalization of the
//! same cart finds it gone and rolls back. Any failure before the commit drops
//! the transaction, which rolls it back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use orderflow_catalog::Product;
use orderflow_core::{DomainError, Money, OrderId, ProductId, SessionId};
use orderflow_coupons::{Coupon, CouponKind, CreateCoupon};
use orderflow_inventory::{StockItem, total_available};
use orderflow_sales::{Cart, CartLine, Order, PricingLine, Quote, price};

use crate::cart_store::CartStore;
use crate::ledger::{LedgerError, deduct_in};
use crate::store::{CommerceStore, StoreError, StoreTransaction};

/// Checkout failure, as reported to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(
        "insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Storage failed; the unit of work was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => CheckoutError::Validation(msg),
            DomainError::NotFound(what) => CheckoutError::NotFound(what),
            DomainError::Conflict(msg) => CheckoutError::Constraint(msg),
            DomainError::InsufficientStock {
                product_id,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product_id,
                available,
                requested,
            },
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(msg) => CheckoutError::Constraint(msg),
            StoreError::NotFound(what) => CheckoutError::NotFound(what),
            StoreError::Concurrency(msg) | StoreError::Backend(msg) => {
                CheckoutError::Persistence(msg)
            }
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Domain(e) => e.into(),
            LedgerError::NotFound(what) => CheckoutError::NotFound(what),
            LedgerError::Store(e) => e.into(),
        }
    }
}

/// A cart line resolved against the active catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartViewLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub subtotal: Money,
    /// Shipping for the undiscounted subtotal.
    pub shipping: Money,
    pub total: Money,
    pub warnings: Vec<String>,
}

/// A coupon that made it into a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub kind: CouponKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutPreview {
    pub quote: Quote,
    pub coupon: Option<AppliedCoupon>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedOrder {
    pub order: Order,
    pub quote: Quote,
    pub warnings: Vec<String>,
}

/// Checkout service over an injected store and cart store.
pub struct CheckoutService<S> {
    store: Arc<S>,
    carts: Arc<dyn CartStore>,
}

impl<S> Clone for CheckoutService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            carts: self.carts.clone(),
        }
    }
}

impl<S: CommerceStore> CheckoutService<S> {
    pub fn new(store: Arc<S>, carts: Arc<dyn CartStore>) -> Self {
        Self { store, carts }
    }

    // Cart

    /// Cart lines with current catalog data, priced without a coupon. Lines
    /// whose product is gone are dropped from the session cart with a warning.
    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    pub async fn view_cart(&self, session_id: SessionId) -> Result<CartView, CheckoutError> {
        let mut warnings = Vec::new();
        let resolved = {
            let mut tx = self.store.begin().await?;
            self.resolve_for_display(&mut tx, session_id, &mut warnings)
                .await?
        };

        if resolved.is_empty() {
            return Ok(CartView {
                lines: Vec::new(),
                subtotal: Money::ZERO,
                shipping: Money::ZERO,
                total: Money::ZERO,
                warnings,
            });
        }

        let quote = quote_for(&resolved, None)?;
        let lines = resolved
            .iter()
            .zip(&quote.lines)
            .map(|((_, product), priced)| CartViewLine {
                product_id: priced.product_id,
                sku: product.sku().to_string(),
                name: product.name().to_string(),
                quantity: priced.quantity,
                unit_price: priced.unit_price,
                line_total: priced.line_total,
            })
            .collect();

        Ok(CartView {
            lines,
            subtotal: quote.subtotal,
            shipping: quote.shipping,
            total: quote.total,
            warnings,
        })
    }

    /// Add `quantity` of an active product to the session cart.
    #[instrument(skip(self, session_id), fields(session_id = %session_id), err)]
    pub async fn add_to_cart(
        &self,
        session_id: SessionId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CheckoutError> {
        if quantity <= 0 {
            return Err(CheckoutError::Validation("quantity must be positive".to_string()));
        }

        {
            let mut tx = self.store.begin().await?;
            if tx.active_product(product_id).await?.is_none() {
                return Err(CheckoutError::ProductNotFound(product_id));
            }
        }

        let mut result = Ok(());
        self.carts
            .modify(session_id, &mut |cart| result = cart.add(product_id, quantity));
        Ok(result?)
    }

    /// Set a line's quantity; zero removes it.
    #[instrument(skip(self, session_id), fields(session_id = %session_id), err)]
    pub async fn update_cart_line(
        &self,
        session_id: SessionId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CheckoutError> {
        let mut result = Ok(());
        self.carts.modify(session_id, &mut |cart| {
            result = cart.set_quantity(product_id, quantity)
        });
        Ok(result?)
    }

    /// Remove a line. Returns whether the cart held it.
    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    pub async fn remove_from_cart(&self, session_id: SessionId, product_id: ProductId) -> bool {
        let mut removed = false;
        self.carts
            .modify(session_id, &mut |cart| removed = cart.remove(product_id));
        removed
    }

    // Checkout

    /// Price the current cart without side effects on stock or orders.
    #[instrument(skip(self, session_id), fields(session_id = %session_id), err)]
    pub async fn preview_checkout(
        &self,
        session_id: SessionId,
        coupon_code: Option<&str>,
    ) -> Result<CheckoutPreview, CheckoutError> {
        if self.carts.get(session_id).is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut warnings = Vec::new();
        let mut tx = self.store.begin().await?;
        let resolved = self
            .resolve_for_display(&mut tx, session_id, &mut warnings)
            .await?;
        if resolved.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        for (line, _) in &resolved {
            let items = tx.stock_items_for_product(line.product_id, false).await?;
            check_available(line, &items)?;
        }

        let coupon = resolve_coupon(&mut tx, coupon_code, Utc::now(), &mut warnings).await?;
        drop(tx);

        let quote = quote_for(&resolved, coupon.as_ref())?;
        Ok(CheckoutPreview {
            quote,
            coupon: coupon.map(|c| AppliedCoupon {
                code: c.code().to_string(),
                kind: c.discount().kind(),
            }),
            warnings,
        })
    }

    /// Turn the session cart into a confirmed order and deduct its stock.
    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    pub async fn finalize_order(
        &self,
        session_id: SessionId,
        coupon_code: Option<&str>,
    ) -> Result<FinalizedOrder, CheckoutError> {
        let cart = self.carts.get(session_id);
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        match self
            .finalize_in_transaction(session_id, &cart, coupon_code, Utc::now())
            .await
        {
            Ok(finalized) => {
                info!(
                    order_id = %finalized.order.id_typed(),
                    total = %finalized.order.total(),
                    lines = finalized.order.lines().len(),
                    "order finalized"
                );
                Ok(finalized)
            }
            Err(err @ CheckoutError::Persistence(_)) => {
                error!(error = %err, "order finalization rolled back");
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "order finalization rejected");
                Err(err)
            }
        }
    }

    async fn finalize_in_transaction(
        &self,
        session_id: SessionId,
        priced_cart: &Cart,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FinalizedOrder, CheckoutError> {
        let cart = priced_cart.snapshot();
        let mut warnings = Vec::new();
        let mut tx = self.store.begin().await?;

        // Lock every product's stock rows up front, in id order, so concurrent
        // checkouts over overlapping carts acquire locks in the same order.
        let mut product_ids: Vec<ProductId> = cart.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let mut stock: HashMap<ProductId, Vec<StockItem>> = HashMap::new();
        for product_id in product_ids {
            let items = tx.stock_items_for_product(product_id, true).await?;
            stock.insert(product_id, items);
        }

        let mut resolved = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = tx
                .active_product(line.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            let items = stock.get(&line.product_id).map(Vec::as_slice).unwrap_or(&[]);
            check_available(line, items)?;
            resolved.push((*line, product));
        }

        let coupon = resolve_coupon(&mut tx, coupon_code, now, &mut warnings).await?;
        let quote = quote_for(&resolved, coupon.as_ref())?;
        let coupon_ids = coupon.iter().map(Coupon::id_typed).collect();
        let order = Order::confirmed(OrderId::new(), now, &quote, coupon_ids)?;

        tx.insert_order(&order).await?;
        for line in order.lines() {
            tx.insert_order_line(line).await?;
        }
        for coupon_id in order.coupon_ids() {
            tx.insert_order_coupon(order.id_typed(), *coupon_id).await?;
        }

        for line in order.lines() {
            let items = stock.entry(line.product_id).or_default();
            if let Err(err) = deduct_in(&mut tx, line.product_id, items, line.quantity).await {
                error!(
                    product_id = %line.product_id,
                    requested = line.quantity,
                    error = %err,
                    "stock deduction failed; rolling back order"
                );
                return Err(err.into());
            }
        }

        if !self.carts.take_if_unchanged(session_id, priced_cart) {
            let err = if self.carts.get(session_id).is_empty() {
                CheckoutError::EmptyCart
            } else {
                CheckoutError::Validation(
                    "cart changed during checkout; review it and try again".to_string(),
                )
            };
            return Err(err);
        }
        if let Err(err) = tx.commit().await {
            self.restore_cart(session_id, priced_cart);
            return Err(err.into());
        }

        Ok(FinalizedOrder {
            order,
            quote,
            warnings,
        })
    }

    /// Put a taken cart back after a failed commit, unless the session has
    /// started a new one meanwhile.
    fn restore_cart(&self, session_id: SessionId, cart: &Cart) {
        self.carts.modify(session_id, &mut |current| {
            if current.is_empty() {
                *current = cart.clone();
            }
        });
    }

    /// Resolve cart lines against the active catalog, pruning lines whose
    /// product is gone from the session cart.
    async fn resolve_for_display(
        &self,
        tx: &mut S::Tx,
        session_id: SessionId,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<(CartLine, Product)>, CheckoutError> {
        let cart = self.carts.get(session_id);
        let mut resolved = Vec::new();
        let mut pruned = Vec::new();

        for line in cart.snapshot() {
            match tx.active_product(line.product_id).await? {
                Some(product) => resolved.push((line, product)),
                None => {
                    warn!(product_id = %line.product_id, "dropping unavailable product from cart");
                    warnings.push(format!(
                        "product {} is no longer available and was removed from the cart",
                        line.product_id
                    ));
                    pruned.push(line.product_id);
                }
            }
        }

        if !pruned.is_empty() {
            self.carts.modify(session_id, &mut |cart| {
                for product_id in &pruned {
                    cart.remove(*product_id);
                }
            });
        }
        Ok(resolved)
    }

    // Orders

    pub async fn order(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let mut tx = self.store.begin().await?;
        tx.order(order_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("order {order_id}")))
    }

    /// Delete an order with its lines and coupon links.
    #[instrument(skip(self), err)]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), CheckoutError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_order(order_id).await? {
            return Err(CheckoutError::NotFound(format!("order {order_id}")));
        }
        tx.commit().await?;
        info!(%order_id, "order deleted");
        Ok(())
    }

    // Coupons

    #[instrument(skip(self, cmd), fields(code = %cmd.code), err)]
    pub async fn register_coupon(&self, cmd: CreateCoupon) -> Result<Coupon, CheckoutError> {
        let coupon = Coupon::create(&cmd)?;
        let mut tx = self.store.begin().await?;
        tx.insert_coupon(&coupon).await.map_err(|e| match e {
            StoreError::Constraint(_) => CheckoutError::Constraint(format!(
                "coupon code '{}' is already in use",
                coupon.code()
            )),
            other => other.into(),
        })?;
        tx.commit().await?;
        Ok(coupon)
    }
}

fn check_available(line: &CartLine, items: &[StockItem]) -> Result<(), CheckoutError> {
    let available = total_available(items)?;
    if line.quantity > available {
        warn!(
            product_id = %line.product_id,
            available,
            requested = line.quantity,
            "insufficient stock"
        );
        return Err(CheckoutError::InsufficientStock {
            product_id: line.product_id,
            available,
            requested: line.quantity,
        });
    }
    Ok(())
}

fn quote_for(
    resolved: &[(CartLine, Product)],
    coupon: Option<&Coupon>,
) -> Result<Quote, CheckoutError> {
    let lines: Vec<PricingLine> = resolved
        .iter()
        .map(|(line, product)| PricingLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: product.price(),
        })
        .collect();
    let coupons: Vec<&Coupon> = coupon.into_iter().collect();
    Ok(price(&lines, &coupons)?)
}

/// Look up a coupon by code. Unknown or invalid coupons are ignored with a warning.
async fn resolve_coupon<T: StoreTransaction>(
    tx: &mut T,
    code: Option<&str>,
    now: DateTime<Utc>,
    warnings: &mut Vec<String>,
) -> Result<Option<Coupon>, CheckoutError> {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    match tx.coupon_by_code(code).await? {
        Some(coupon) if coupon.is_valid(now) => Ok(Some(coupon)),
        Some(_) => {
            warn!(code, "ignoring expired or inactive coupon");
            warnings.push(format!("coupon '{code}' is expired or inactive and was not applied"));
            Ok(None)
        }
        None => {
            warn!(code, "ignoring unknown coupon");
            warnings.push(format!("coupon '{code}' does not exist and was not applied"));
            Ok(None)
        }
    }
}
