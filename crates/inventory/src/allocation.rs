//! Deciding which stock rows a sale draws from.

use orderflow_core::{DomainError, DomainResult, ProductId, StockItemId};

use crate::stock::StockItem;

/// Sum of on-hand quantity across rows. Fails if the total does not fit an `i64`.
pub fn total_available(items: &[StockItem]) -> DomainResult<i64> {
    checked_total(items.iter().map(StockItem::quantity))
}

pub(crate) fn checked_total(quantities: impl IntoIterator<Item = i64>) -> DomainResult<i64> {
    quantities.into_iter().try_fold(0i64, |acc, q| {
        acc.checked_add(q)
            .ok_or_else(|| DomainError::validation("total stock quantity is out of range"))
    })
}

/// One planned decrement against a single stock row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Deduction {
    pub stock_item_id: StockItemId,
    pub quantity: i64,
}

/// Plan the decrements that cover `requested` units of `product_id`.
///
/// `items` must be in row creation order. Draws from the first row holding any
/// quantity and spills the remainder into the following rows. Fails with
/// `InsufficientStock` when the rows together hold less than `requested`.
pub fn plan_deduction(
    product_id: ProductId,
    items: &[StockItem],
    requested: i64,
) -> DomainResult<Vec<Deduction>> {
    if requested <= 0 {
        return Err(DomainError::validation("requested quantity must be positive"));
    }

    let available = total_available(items)?;
    if available < requested {
        return Err(DomainError::insufficient_stock(product_id, available, requested));
    }

    let mut remaining = requested;
    let mut plan = Vec::new();
    for item in items.iter().filter(|i| i.quantity() > 0) {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(item.quantity());
        plan.push(Deduction {
            stock_item_id: item.id_typed(),
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderflow_core::LocationId;

    fn rows(product_id: ProductId, quantities: &[i64]) -> Vec<StockItem> {
        quantities
            .iter()
            .map(|q| {
                let mut item = StockItem::provision(product_id, LocationId::new(), Utc::now());
                item.add(*q).unwrap();
                item
            })
            .collect()
    }

    #[test]
    fn single_row_covers_line() {
        let p = ProductId::new();
        let items = rows(p, &[10]);
        let plan = plan_deduction(p, &items, 4).unwrap();
        assert_eq!(
            plan,
            vec![Deduction {
                stock_item_id: items[0].id_typed(),
                quantity: 4
            }]
        );
    }

    #[test]
    fn skips_empty_rows_and_spills_over() {
        let p = ProductId::new();
        let items = rows(p, &[0, 2, 5]);
        let plan = plan_deduction(p, &items, 4).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].stock_item_id, items[1].id_typed());
        assert_eq!(plan[0].quantity, 2);
        assert_eq!(plan[1].stock_item_id, items[2].id_typed());
        assert_eq!(plan[1].quantity, 2);
    }

    #[test]
    fn shortfall_reports_aggregate_availability() {
        let p = ProductId::new();
        let items = rows(p, &[1, 2]);
        match plan_deduction(p, &items, 5).unwrap_err() {
            DomainError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, p);
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn untracked_product_has_nothing_available() {
        let p = ProductId::new();
        let err = plan_deduction(p, &[], 1).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(p, 0, 1));
    }

    #[test]
    fn total_overflow_is_an_error_not_a_wrap() {
        let p = ProductId::new();
        let items: Vec<StockItem> = (0..2)
            .map(|_| {
                StockItem::from_parts(
                    StockItemId::new(),
                    p,
                    LocationId::new(),
                    i64::MAX,
                    1,
                    Utc::now(),
                )
                .unwrap()
            })
            .collect();

        assert!(matches!(total_available(&items), Err(DomainError::Validation(_))));
        assert!(matches!(
            plan_deduction(p, &items, 1),
            Err(DomainError::Validation(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a successful plan takes exactly the requested amount and
            /// never more than a row holds.
            #[test]
            fn plan_takes_exactly_requested(
                quantities in prop::collection::vec(0i64..50, 0..6),
                requested in 1i64..200,
            ) {
                let p = ProductId::new();
                let items = rows(p, &quantities);
                match plan_deduction(p, &items, requested) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.iter().map(|d| d.quantity).sum::<i64>(), requested);
                        for d in &plan {
                            let row = items.iter().find(|i| i.id_typed() == d.stock_item_id).unwrap();
                            prop_assert!(d.quantity > 0 && d.quantity <= row.quantity());
                        }
                    }
                    Err(_) => prop_assert!(total_available(&items).unwrap() < requested),
                }
            }
        }
    }
}
