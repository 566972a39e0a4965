use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{CouponId, DomainError, Entity, Money, Percentage};

/// Discount carried by a coupon.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponDiscount {
    /// Fraction of the running total. Values above 100% floor the total at zero.
    Percentage(Percentage),
    /// Flat reduction, floored at zero.
    FixedAmount(Money),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponKind {
    Percentage,
    FixedAmount,
}

impl CouponKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CouponKind::Percentage => "PERCENTAGE",
            CouponKind::FixedAmount => "FIXED_AMOUNT",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PERCENTAGE" => Ok(CouponKind::Percentage),
            "FIXED_AMOUNT" => Ok(CouponKind::FixedAmount),
            other => Err(DomainError::validation(format!("unknown coupon kind: {other}"))),
        }
    }
}

impl CouponDiscount {
    pub fn kind(&self) -> CouponKind {
        match self {
            CouponDiscount::Percentage(_) => CouponKind::Percentage,
            CouponDiscount::FixedAmount(_) => CouponKind::FixedAmount,
        }
    }

    /// Raw stored value: hundredths of a percent, or cents.
    pub fn raw_value(&self) -> u64 {
        match self {
            CouponDiscount::Percentage(p) => u64::from(p.hundredths()),
            CouponDiscount::FixedAmount(m) => m.cents(),
        }
    }

    /// Rebuild from the stored `(kind, raw_value)` pair.
    pub fn from_raw(kind: CouponKind, raw_value: u64) -> Result<Self, DomainError> {
        match kind {
            CouponKind::Percentage => u32::try_from(raw_value)
                .map(|h| CouponDiscount::Percentage(Percentage::from_hundredths(h)))
                .map_err(|_| DomainError::validation("percentage value out of range")),
            CouponKind::FixedAmount => Ok(CouponDiscount::FixedAmount(Money::from_cents(raw_value))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    id: CouponId,
    code: String,
    discount: CouponDiscount,
    expiry_date: NaiveDate,
    active: bool,
}

impl Coupon {
    pub fn from_parts(
        id: CouponId,
        code: String,
        discount: CouponDiscount,
        expiry_date: NaiveDate,
        active: bool,
    ) -> Self {
        Self {
            id,
            code,
            discount,
            expiry_date,
            active,
        }
    }

    pub fn create(cmd: &CreateCoupon) -> Result<Self, DomainError> {
        let code = cmd.code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("coupon code cannot be empty"));
        }

        Ok(Self {
            id: cmd.coupon_id,
            code: code.to_string(),
            discount: cmd.discount,
            expiry_date: cmd.expiry_date,
            active: cmd.active,
        })
    }

    pub fn id_typed(&self) -> CouponId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn discount(&self) -> CouponDiscount {
        self.discount
    }

    pub fn expiry_date(&self) -> NaiveDate {
        self.expiry_date
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Active and not past its expiry date. The expiry day itself is still valid.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && now.date_naive() <= self.expiry_date
    }

    /// Apply this coupon to a running total.
    pub fn apply_to(&self, running: Money) -> Money {
        match self.discount {
            CouponDiscount::Percentage(p) => running.saturating_sub(p.of(running)),
            CouponDiscount::FixedAmount(amount) => running.saturating_sub(amount),
        }
    }
}

impl Entity for Coupon {
    type Id = CouponId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: CreateCoupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount: CouponDiscount,
    pub expiry_date: NaiveDate,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_coupon(discount: CouponDiscount, expiry: NaiveDate, active: bool) -> Coupon {
        Coupon::create(&CreateCoupon {
            coupon_id: CouponId::new(),
            code: "SAVE".to_string(),
            discount,
            expiry_date: expiry,
            active,
        })
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn create_rejects_blank_code() {
        let err = Coupon::create(&CreateCoupon {
            coupon_id: CouponId::new(),
            code: "  ".to_string(),
            discount: CouponDiscount::FixedAmount(Money::from_units(5)),
            expiry_date: date(2030, 1, 1),
            active: true,
        })
        .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("code")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn valid_through_the_whole_expiry_day() {
        let coupon = test_coupon(
            CouponDiscount::Percentage(Percentage::from_whole(10)),
            date(2025, 6, 30),
            true,
        );
        let last_second = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        assert!(coupon.is_valid(last_second));
        assert!(!coupon.is_valid(last_second + Duration::seconds(1)));
    }

    #[test]
    fn inactive_coupon_is_never_valid() {
        let coupon = test_coupon(
            CouponDiscount::Percentage(Percentage::from_whole(10)),
            date(2099, 1, 1),
            false,
        );
        assert!(!coupon.is_valid(Utc::now()));
    }

    #[test]
    fn percentage_reduces_running_total() {
        let coupon = test_coupon(
            CouponDiscount::Percentage(Percentage::from_whole(10)),
            date(2099, 1, 1),
            true,
        );
        assert_eq!(coupon.apply_to(Money::from_units(150)), Money::from_units(135));
    }

    #[test]
    fn over_hundred_percent_floors_at_zero() {
        let coupon = test_coupon(
            CouponDiscount::Percentage(Percentage::from_whole(150)),
            date(2099, 1, 1),
            true,
        );
        assert_eq!(coupon.apply_to(Money::from_units(80)), Money::ZERO);
    }

    #[test]
    fn fixed_amount_floors_at_zero() {
        let coupon = test_coupon(
            CouponDiscount::FixedAmount(Money::from_units(25)),
            date(2099, 1, 1),
            true,
        );
        assert_eq!(coupon.apply_to(Money::from_units(10)), Money::ZERO);
        assert_eq!(coupon.apply_to(Money::from_units(30)), Money::from_units(5));
    }

    #[test]
    fn raw_value_round_trips_through_storage_columns() {
        let d = CouponDiscount::Percentage(Percentage::from_hundredths(1250));
        let back = CouponDiscount::from_raw(CouponKind::parse(d.kind().as_str()).unwrap(), d.raw_value())
            .unwrap();
        assert_eq!(back, d);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: applying any coupon never increases the running total.
            #[test]
            fn apply_never_increases_total(
                running in 0u64..100_000_000,
                value in 0u64..100_000_000,
                percentage in any::<bool>(),
            ) {
                let discount = if percentage {
                    CouponDiscount::Percentage(Percentage::from_hundredths((value % 20_000) as u32))
                } else {
                    CouponDiscount::FixedAmount(Money::from_cents(value))
                };
                let coupon = test_coupon(discount, date(2099, 1, 1), true);
                prop_assert!(coupon.apply_to(Money::from_cents(running)) <= Money::from_cents(running));
            }
        }
    }
}
