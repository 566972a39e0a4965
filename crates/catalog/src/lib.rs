//! Catalog domain module.
//!
//! Products are owned by catalog management outside the order core; this crate
//! holds the read model the core consumes (identity, unit price, tombstone)
//! and the validation applied when a product is registered.

pub mod product;

pub use product::{CreateProduct, Product};
