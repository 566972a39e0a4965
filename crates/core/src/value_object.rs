//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Two
/// `Money` amounts of 15.00 are the same amount; two products named "Mug" are
/// not the same product.
///
/// ```ignore
/// let a = Money::from_units(15);
/// let b = Money::from_cents(1_500);
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
