use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, Entity, LocationId};

/// A named place holding independent quantity for each product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLocation {
    id: LocationId,
    name: String,
}

impl StockLocation {
    pub fn new(id: LocationId, name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("location name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.trim().to_string(),
        })
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for StockLocation {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
