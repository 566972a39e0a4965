use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, Entity, Money, ProductId};

/// Catalog entity: Product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    price: Money,
    deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Rebuild a product from persisted columns.
    pub fn from_parts(
        id: ProductId,
        sku: String,
        name: String,
        price: Money,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            sku,
            name,
            price,
            deleted_at,
        }
    }

    /// Validate a registration command and build the product.
    pub fn create(cmd: &CreateProduct) -> Result<Self, DomainError> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        // SKU uniqueness is a storage constraint; the store reports duplicates.

        Ok(Self {
            id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            price: cmd.price,
            deleted_at: None,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current unit sale price.
    pub fn price(&self) -> Money {
        self.price
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// A product without a tombstone can be put in new carts and orders.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Set the tombstone. A second delete is a conflict and keeps the first timestamp.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.deleted_at.is_some() {
            return Err(DomainError::conflict("product is already deleted"));
        }
        self.deleted_at = Some(at);
        Ok(())
    }

    /// Change the unit sale price for future carts. Tombstoned products are frozen.
    pub fn change_price(&mut self, price: Money) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::conflict("cannot reprice a deleted product"));
        }
        self.price = price;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(sku: &str, name: &str) -> CreateProduct {
        CreateProduct {
            product_id: ProductId::new(),
            sku: sku.to_string(),
            name: name.to_string(),
            price: Money::from_units(50),
        }
    }

    #[test]
    fn create_product_trims_and_starts_active() {
        let product = Product::create(&cmd(" SKU-001 ", "Coffee mug ")).unwrap();
        assert_eq!(product.sku(), "SKU-001");
        assert_eq!(product.name(), "Coffee mug");
        assert_eq!(product.price(), Money::from_units(50));
        assert!(product.is_active());
    }

    #[test]
    fn create_product_rejects_empty_name() {
        let err = Product::create(&cmd("SKU-001", "   ")).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("name")),
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn create_product_rejects_empty_sku() {
        let err = Product::create(&cmd("", "Coffee mug")).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("SKU")),
            _ => panic!("Expected Validation error for empty SKU"),
        }
    }

    #[test]
    fn soft_delete_sets_tombstone_once() {
        let mut product = Product::create(&cmd("SKU-001", "Coffee mug")).unwrap();
        let at = Utc::now();
        product.soft_delete(at).unwrap();
        assert!(!product.is_active());
        assert_eq!(product.deleted_at(), Some(at));

        let err = product.soft_delete(Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(product.deleted_at(), Some(at));
    }

    #[test]
    fn change_price_applies_only_to_active_products() {
        let mut product = Product::create(&cmd("SKU-001", "Coffee mug")).unwrap();
        product.change_price(Money::from_units(80)).unwrap();
        assert_eq!(product.price(), Money::from_units(80));

        product.soft_delete(Utc::now()).unwrap();
        let err = product.change_price(Money::from_units(10)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(product.price(), Money::from_units(80));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any non-blank SKU and name produce an active product
            /// that keeps its price untouched.
            #[test]
            fn valid_commands_always_create_active_products(
                sku in "[A-Z0-9]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,99}",
                cents in 0u64..100_000_000u64,
            ) {
                let cmd = CreateProduct {
                    product_id: ProductId::new(),
                    sku,
                    name,
                    price: Money::from_cents(cents),
                };
                let product = Product::create(&cmd).unwrap();
                prop_assert!(product.is_active());
                prop_assert_eq!(product.price().cents(), cents);
            }
        }
    }
}
