use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, ProductId};

/// A requested quantity of one product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Session cart: product → requested quantity, in the order lines were first added.
///
/// Every stored quantity is positive; setting a line to zero removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` units, accumulating onto an existing line.
    pub fn add(&mut self, product_id: ProductId, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match self.line_mut(product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::validation("quantity too large"))?;
            }
            None => self.lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
        Ok(())
    }

    /// Replace the quantity of an existing line. Zero removes the line.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> DomainResult<()> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if quantity == 0 {
            self.remove(product_id);
            return Ok(());
        }

        let line = self
            .line_mut(product_id)
            .ok_or_else(|| DomainError::not_found(format!("cart line for product {product_id}")))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<i64> {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
    }

    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates() {
        let p = ProductId::new();
        let mut cart = Cart::new();
        cart.add(p, 2).unwrap();
        cart.add(p, 3).unwrap();
        assert_eq!(cart.quantity_of(p), Some(5));
        assert_eq!(cart.snapshot().len(), 1);
    }

    #[test]
    fn add_rejects_non_positive() {
        let mut cart = Cart::new();
        for qty in [0, -1] {
            let err = cart.add(ProductId::new(), qty).unwrap_err();
            match err {
                DomainError::Validation(_) => {}
                _ => panic!("Expected Validation error for quantity {qty}"),
            }
        }
        assert!(cart.is_empty());
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut cart = Cart::new();
        cart.add(b, 1).unwrap();
        cart.add(a, 1).unwrap();
        cart.add(b, 1).unwrap();
        let ids: Vec<_> = cart.snapshot().iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let p = ProductId::new();
        let mut cart = Cart::new();
        cart.add(p, 4).unwrap();
        cart.set_quantity(p, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_replaces() {
        let p = ProductId::new();
        let mut cart = Cart::new();
        cart.add(p, 4).unwrap();
        cart.set_quantity(p, 1).unwrap();
        assert_eq!(cart.quantity_of(p), Some(1));
    }

    #[test]
    fn set_quantity_on_missing_line_is_not_found() {
        let mut cart = Cart::new();
        let err = cart.set_quantity(ProductId::new(), 2).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn set_quantity_rejects_negative() {
        let p = ProductId::new();
        let mut cart = Cart::new();
        cart.add(p, 4).unwrap();
        let err = cart.set_quantity(p, -2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(cart.quantity_of(p), Some(4));
    }

    #[test]
    fn remove_is_idempotent() {
        let p = ProductId::new();
        let mut cart = Cart::new();
        cart.add(p, 1).unwrap();
        assert!(cart.remove(p));
        assert!(!cart.remove(p));
    }

    #[test]
    fn clear_empties_cart() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(), 1).unwrap();
        cart.add(ProductId::new(), 2).unwrap();
        cart.clear();
        assert!(cart.is_empty());
    }
}
