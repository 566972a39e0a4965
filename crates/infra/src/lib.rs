//! Infrastructure layer: storage backends, session carts, and the ledger and
//! checkout services that run units of work against them.

pub mod cart_store;
pub mod checkout;
pub mod ledger;
pub mod store;


pub use cart_store::{CartStore, InMemoryCartStore};
pub use checkout::{
    AppliedCoupon, CartView, CartViewLine, CheckoutError, CheckoutPreview, CheckoutService,
    FinalizedOrder,
};
pub use ledger::{InventoryLedger, LedgerError};
pub use store::{CommerceStore, InMemoryStore, PostgresStore, StoreError, StoreTransaction};
