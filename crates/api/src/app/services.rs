//! Service wiring: one store backend shared by the checkout service and the
//! inventory ledger.

use std::sync::Arc;

use anyhow::Context;

use orderflow_catalog::{CreateProduct, Product};
use orderflow_core::{LocationId, Money, OrderId, ProductId, SessionId};
use orderflow_coupons::{Coupon, CreateCoupon};
use orderflow_infra::{
    CartStore, CartView, CheckoutError, CheckoutPreview, CheckoutService, FinalizedOrder,
    InMemoryCartStore, InMemoryStore, InventoryLedger, PostgresStore,
};
use orderflow_inventory::{StockDirection, StockItem, StockLevels, StockLocation};
use orderflow_sales::Order;

use crate::config::AppConfig;

/// Application services over the configured backend.
#[derive(Clone)]
pub enum AppServices {
    InMemory {
        checkout: CheckoutService<InMemoryStore>,
        ledger: InventoryLedger<InMemoryStore>,
    },
    Persistent {
        checkout: CheckoutService<PostgresStore>,
        ledger: InventoryLedger<PostgresStore>,
    },
}

macro_rules! with_services {
    ($self:expr, |$checkout:ident, $ledger:ident| $body:expr) => {
        match $self {
            AppServices::InMemory {
                checkout: $checkout,
                ledger: $ledger,
            } => $body,
            AppServices::Persistent {
                checkout: $checkout,
                ledger: $ledger,
            } => $body,
        }
    };
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let carts: Arc<dyn CartStore> = Arc::new(InMemoryCartStore::new());

    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            tracing::info!("using postgres store");
            Ok(AppServices::persistent(
                store,
                carts,
                &config.default_stock_location,
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Ok(AppServices::in_memory_with(
                InMemoryStore::new(),
                carts,
                &config.default_stock_location,
            ))
        }
    }
}

impl AppServices {
    /// Fresh in-memory services; used by tests and local runs.
    pub fn in_memory(default_location: &str) -> Self {
        Self::in_memory_with(
            InMemoryStore::new(),
            Arc::new(InMemoryCartStore::new()),
            default_location,
        )
    }

    pub fn in_memory_with(
        store: InMemoryStore,
        carts: Arc<dyn CartStore>,
        default_location: &str,
    ) -> Self {
        let store = Arc::new(store);
        AppServices::InMemory {
            checkout: CheckoutService::new(store.clone(), carts),
            ledger: InventoryLedger::new(store, default_location),
        }
    }

    pub fn persistent(
        store: PostgresStore,
        carts: Arc<dyn CartStore>,
        default_location: &str,
    ) -> Self {
        let store = Arc::new(store);
        AppServices::Persistent {
            checkout: CheckoutService::new(store.clone(), carts),
            ledger: InventoryLedger::new(store, default_location),
        }
    }

    // Cart

    pub async fn view_cart(&self, session_id: SessionId) -> Result<CartView, CheckoutError> {
        with_services!(self, |checkout, _ledger| checkout.view_cart(session_id).await)
    }

    pub async fn add_to_cart(
        &self,
        session_id: SessionId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CheckoutError> {
        with_services!(self, |checkout, _ledger| {
            checkout.add_to_cart(session_id, product_id, quantity).await
        })
    }

    pub async fn update_cart_line(
        &self,
        session_id: SessionId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CheckoutError> {
        with_services!(self, |checkout, _ledger| {
            checkout.update_cart_line(session_id, product_id, quantity).await
        })
    }

    pub async fn remove_from_cart(&self, session_id: SessionId, product_id: ProductId) -> bool {
        with_services!(self, |checkout, _ledger| {
            checkout.remove_from_cart(session_id, product_id).await
        })
    }

    // Checkout

    pub async fn preview_checkout(
        &self,
        session_id: SessionId,
        coupon_code: Option<&str>,
    ) -> Result<CheckoutPreview, CheckoutError> {
        with_services!(self, |checkout, _ledger| {
            checkout.preview_checkout(session_id, coupon_code).await
        })
    }

    pub async fn finalize_order(
        &self,
        session_id: SessionId,
        coupon_code: Option<&str>,
    ) -> Result<FinalizedOrder, CheckoutError> {
        with_services!(self, |checkout, _ledger| {
            checkout.finalize_order(session_id, coupon_code).await
        })
    }

    // Orders

    pub async fn order(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        with_services!(self, |checkout, _ledger| checkout.order(order_id).await)
    }

    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), CheckoutError> {
        with_services!(self, |checkout, _ledger| checkout.delete_order(order_id).await)
    }

    // Catalog maintenance

    pub async fn register_product(&self, cmd: CreateProduct) -> Result<Product, CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger.register_product(cmd).await.map_err(Into::into)
        })
    }

    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger.delete_product(product_id).await.map_err(Into::into)
        })
    }

    pub async fn update_product_price(
        &self,
        product_id: ProductId,
        price: Money,
    ) -> Result<Product, CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger
                .update_product_price(product_id, price)
                .await
                .map_err(Into::into)
        })
    }

    pub async fn register_coupon(&self, cmd: CreateCoupon) -> Result<Coupon, CheckoutError> {
        with_services!(self, |checkout, _ledger| checkout.register_coupon(cmd).await)
    }

    // Inventory

    pub async fn create_location(&self, name: &str) -> Result<StockLocation, CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger.create_location(name).await.map_err(Into::into)
        })
    }

    pub async fn stock_levels(&self, product_id: ProductId) -> Result<StockLevels, CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger.stock_levels(product_id).await.map_err(Into::into)
        })
    }

    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        direction: StockDirection,
    ) -> Result<StockItem, CheckoutError> {
        with_services!(self, |_checkout, ledger| {
            ledger
                .adjust_stock(product_id, location_id, quantity, direction)
                .await
                .map_err(Into::into)
        })
    }
}
