//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Catalog rows (products, locations, coupons) are entities: they are looked up
/// and referenced by id, but they are not units of consistency on their own.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
