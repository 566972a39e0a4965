//! Coupon domain module.
//!
//! Coupons are looked up by code at checkout. An unknown or invalid coupon is
//! never fatal; callers drop it with a warning.

pub mod coupon;

pub use coupon::{Coupon, CouponDiscount, CouponKind, CreateCoupon};
