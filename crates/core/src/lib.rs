//! `orderflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, the domain error model and the aggregate/entity traits.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CouponId, LocationId, OrderId, OrderLineId, ProductId, SessionId, StockItemId};
pub use money::{Money, Percentage};
pub use value_object::ValueObject;
