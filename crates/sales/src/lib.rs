//! Sales domain module.
//!
//! This crate contains the shopping cart, the pricing pipeline and the order
//! aggregate, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod cart;
pub mod order;
pub mod pricing;

pub use cart::{Cart, CartLine};
pub use order::{Order, OrderLine, OrderStatus};
pub use pricing::{PricedLine, PricingLine, Quote, price, shipping_for};
