//! Pricing pipeline: subtotal, coupon discounts, shipping, grand total.
//!
//! Pure and deterministic. Checkout previews and finalized orders both go
//! through [`price`], so a quoted total is exactly what gets persisted.

use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, Money, ProductId};
use orderflow_coupons::Coupon;

/// Orders strictly above this amount ship free.
pub const FREE_SHIPPING_ABOVE: Money = Money::from_cents(20_000);
/// Inclusive lower bound of the reduced-rate band.
pub const REDUCED_BAND_MIN: Money = Money::from_cents(5_200);
/// Inclusive upper bound of the reduced-rate band.
pub const REDUCED_BAND_MAX: Money = Money::from_cents(16_659);
pub const REDUCED_SHIPPING: Money = Money::from_units(15);
pub const STANDARD_SHIPPING: Money = Money::from_units(20);

/// One line to price: the quantity and the unit price captured for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Result of pricing a set of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    /// `subtotal - discounted`.
    pub discount: Money,
    pub discounted: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Shipping charge for a discounted total.
///
/// The 166.60..=200.00 gap and everything under 52.00 fall to the standard rate.
pub fn shipping_for(discounted: Money) -> Money {
    if discounted > FREE_SHIPPING_ABOVE {
        Money::ZERO
    } else if discounted >= REDUCED_BAND_MIN && discounted <= REDUCED_BAND_MAX {
        REDUCED_SHIPPING
    } else {
        STANDARD_SHIPPING
    }
}

/// Price `lines`, applying `coupons` cumulatively in order.
///
/// Callers pass only coupons that are currently valid.
pub fn price(lines: &[PricingLine], coupons: &[&Coupon]) -> DomainResult<Quote> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Money::ZERO;

    for line in lines {
        let quantity = u64::try_from(line.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| DomainError::validation("line quantity must be positive"))?;
        let line_total = line
            .unit_price
            .checked_times(quantity)
            .ok_or_else(|| DomainError::validation("line total overflow"))?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or_else(|| DomainError::validation("subtotal overflow"))?;
        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total,
        });
    }

    let discounted = coupons
        .iter()
        .fold(subtotal, |running, coupon| coupon.apply_to(running));
    let shipping = shipping_for(discounted);
    let total = discounted
        .checked_add(shipping)
        .ok_or_else(|| DomainError::validation("total overflow"))?;

    Ok(Quote {
        lines: priced,
        subtotal,
        discount: subtotal.saturating_sub(discounted),
        discounted,
        shipping,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orderflow_core::{CouponId, Percentage};
    use orderflow_coupons::{CouponDiscount, CreateCoupon};

    fn test_line(quantity: i64, unit_units: u64) -> PricingLine {
        PricingLine {
            product_id: ProductId::new(),
            quantity,
            unit_price: Money::from_units(unit_units),
        }
    }

    fn test_coupon(discount: CouponDiscount) -> Coupon {
        Coupon::create(&CreateCoupon {
            coupon_id: CouponId::new(),
            code: "TEST".to_string(),
            discount,
            expiry_date: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
            active: true,
        })
        .unwrap()
    }

    #[test]
    fn three_at_fifty_without_coupon() {
        let quote = price(&[test_line(3, 50)], &[]).unwrap();
        assert_eq!(quote.subtotal, Money::from_units(150));
        assert_eq!(quote.discount, Money::ZERO);
        assert_eq!(quote.shipping, Money::from_units(15));
        assert_eq!(quote.total, Money::from_units(165));
    }

    #[test]
    fn three_at_fifty_with_ten_percent() {
        let coupon = test_coupon(CouponDiscount::Percentage(Percentage::from_whole(10)));
        let quote = price(&[test_line(3, 50)], &[&coupon]).unwrap();
        assert_eq!(quote.discounted, Money::from_units(135));
        assert_eq!(quote.discount, Money::from_units(15));
        assert_eq!(quote.shipping, Money::from_units(15));
        assert_eq!(quote.total, Money::from_units(150));
    }

    #[test]
    fn coupons_apply_cumulatively_in_order() {
        let pct = test_coupon(CouponDiscount::Percentage(Percentage::from_whole(10)));
        let fixed = test_coupon(CouponDiscount::FixedAmount(Money::from_units(10)));

        let pct_first = price(&[test_line(2, 100)], &[&pct, &fixed]).unwrap();
        assert_eq!(pct_first.discounted, Money::from_units(170));

        let fixed_first = price(&[test_line(2, 100)], &[&fixed, &pct]).unwrap();
        assert_eq!(fixed_first.discounted, Money::from_units(171));
    }

    #[test]
    fn fixed_coupon_larger_than_subtotal_floors_at_zero() {
        let coupon = test_coupon(CouponDiscount::FixedAmount(Money::from_units(500)));
        let quote = price(&[test_line(1, 30)], &[&coupon]).unwrap();
        assert_eq!(quote.discounted, Money::ZERO);
        assert_eq!(quote.discount, Money::from_units(30));
        assert_eq!(quote.shipping, STANDARD_SHIPPING);
        assert_eq!(quote.total, STANDARD_SHIPPING);
    }

    #[test]
    fn shipping_band_boundaries() {
        let cases = [
            (20_000, 2_000),
            (20_001, 0),
            (5_200, 1_500),
            (16_659, 1_500),
            (16_660, 2_000),
            (5_199, 2_000),
            (0, 2_000),
        ];
        for (discounted, expected) in cases {
            assert_eq!(
                shipping_for(Money::from_cents(discounted)),
                Money::from_cents(expected),
                "shipping for {discounted} cents"
            );
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = price(&[test_line(0, 10)], &[]).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: subtotal is exactly the sum of quantity × unit price and the
            /// total is the discounted amount plus shipping.
            #[test]
            fn totals_are_exact(
                raw in prop::collection::vec((1i64..1_000, 0u64..1_000_000), 0..20),
                fixed in 0u64..10_000_000,
            ) {
                let lines: Vec<PricingLine> = raw
                    .iter()
                    .map(|(q, c)| PricingLine {
                        product_id: ProductId::new(),
                        quantity: *q,
                        unit_price: Money::from_cents(*c),
                    })
                    .collect();
                let coupon = test_coupon(CouponDiscount::FixedAmount(Money::from_cents(fixed)));
                let quote = price(&lines, &[&coupon]).unwrap();

                let expected: u64 = raw.iter().map(|(q, c)| *q as u64 * c).sum();
                prop_assert_eq!(quote.subtotal.cents(), expected);
                prop_assert_eq!(quote.discount + quote.discounted, quote.subtotal);
                prop_assert_eq!(quote.total, quote.discounted + shipping_for(quote.discounted));
            }
        }
    }
}
