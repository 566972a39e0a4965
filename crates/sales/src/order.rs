use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{CouponId, DomainError, Money, OrderId, OrderLineId, ProductId};

use crate::pricing::Quote;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status: {other}"))),
        }
    }
}

/// Order line: product, quantity, unit price frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (cents).
    pub unit_price: Money,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    total: Money,
    lines: Vec<OrderLine>,
    coupon_ids: Vec<CouponId>,
}

impl Order {
    /// Build a confirmed order from a quote. The total is the quote's grand total.
    pub fn confirmed(
        id: OrderId,
        created_at: DateTime<Utc>,
        quote: &Quote,
        coupon_ids: Vec<CouponId>,
    ) -> Result<Self, DomainError> {
        if quote.lines.is_empty() {
            return Err(DomainError::validation("cannot create order without lines"));
        }

        let lines = quote
            .lines
            .iter()
            .map(|l| OrderLine {
                id: OrderLineId::new(),
                order_id: id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        Self::from_parts(
            id,
            created_at,
            OrderStatus::Confirmed,
            quote.total,
            lines,
            coupon_ids,
        )
    }

    /// Rebuild an order from persisted rows.
    pub fn from_parts(
        id: OrderId,
        created_at: DateTime<Utc>,
        status: OrderStatus,
        total: Money,
        lines: Vec<OrderLine>,
        coupon_ids: Vec<CouponId>,
    ) -> Result<Self, DomainError> {
        for line in &lines {
            if line.order_id != id {
                return Err(DomainError::invariant("order_id mismatch"));
            }
            if line.quantity < 1 {
                return Err(DomainError::invariant("order line quantity must be at least 1"));
            }
        }

        Ok(Self {
            id,
            created_at,
            status,
            total,
            lines,
            coupon_ids,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn coupon_ids(&self) -> &[CouponId] {
        &self.coupon_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{PricingLine, price};

    fn test_quote() -> Quote {
        price(
            &[
                PricingLine {
                    product_id: ProductId::new(),
                    quantity: 3,
                    unit_price: Money::from_units(50),
                },
                PricingLine {
                    product_id: ProductId::new(),
                    quantity: 1,
                    unit_price: Money::from_cents(999),
                },
            ],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn confirmed_order_snapshots_quote() {
        let quote = test_quote();
        let order_id = OrderId::new();
        let coupon_id = CouponId::new();
        let order = Order::confirmed(order_id, Utc::now(), &quote, vec![coupon_id]).unwrap();

        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.total(), quote.total);
        assert_eq!(order.coupon_ids(), &[coupon_id]);
        assert_eq!(order.lines().len(), 2);
        for (line, priced) in order.lines().iter().zip(&quote.lines) {
            assert_eq!(line.order_id, order_id);
            assert_eq!(line.product_id, priced.product_id);
            assert_eq!(line.quantity, priced.quantity);
            assert_eq!(line.unit_price, priced.unit_price);
        }
    }

    #[test]
    fn confirmed_rejects_empty_quote() {
        let quote = price(&[], &[]).unwrap();
        let err = Order::confirmed(OrderId::new(), Utc::now(), &quote, vec![]).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty order"),
        }
    }

    #[test]
    fn from_parts_rejects_foreign_lines() {
        let line = OrderLine {
            id: OrderLineId::new(),
            order_id: OrderId::new(),
            product_id: ProductId::new(),
            quantity: 1,
            unit_price: Money::from_units(1),
        };
        let err = Order::from_parts(
            OrderId::new(),
            Utc::now(),
            OrderStatus::Confirmed,
            Money::from_units(21),
            vec![line],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::parse("LOST").is_err());
    }
}
