//! Inventory domain module.
//!
//! This crate contains the business rules for quantity-on-hand per product per
//! location, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage). The ledger operations that persist these rules live in
//! `orderflow-infra`.

pub mod allocation;
pub mod location;
pub mod stock;

pub use allocation::{Deduction, plan_deduction, total_available};
pub use location::StockLocation;
pub use stock::{LocationLevel, StockDirection, StockItem, StockLevels};
