use serde::{Deserialize, Serialize};
use crate::product::{Product, ProductEntry, ProductType};

/// `[catalog]` section of the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub offers: Vec<ProductEntry>,
    #[serde(default)]
    pub packs: Vec<ProductEntry>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Product {id} is a {actual}, not a {expected}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Product not available: {0}")]
    Inactive(String),
}

/// Read-only product catalog, the source of truth for names and prices at checkout.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn from_config(config: CatalogConfig) -> Self {
        let offers = config.offers.into_iter().map(|e| e.into_product(ProductType::Offer));
        let packs = config.packs.into_iter().map(|e| e.into_product(ProductType::Pack));
        Self::new(offers.chain(packs).collect())
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Active offers, cheapest first
    pub fn offers(&self) -> Vec<&Product> {
        self.listed(ProductType::Offer)
    }

    /// Active packs, cheapest first
    pub fn packs(&self) -> Vec<&Product> {
        self.listed(ProductType::Pack)
    }

    fn listed(&self, product_type: ProductType) -> Vec<&Product> {
        let mut items: Vec<&Product> = self.products.iter()
            .filter(|p| p.product_type == product_type && p.is_active)
            .collect();
        items.sort_by_key(|p| p.price_cents);
        items
    }

    /// Look up a purchasable product of the expected type.
    pub fn resolve(&self, id: &str, expected: ProductType) -> Result<&Product, CatalogError> {
        let product = self.get(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        if product.product_type != expected {
            return Err(CatalogError::TypeMismatch {
                id: id.to_string(),
                expected: expected.as_str(),
                actual: product.product_type.as_str(),
            });
        }
        if !product.is_active {
            return Err(CatalogError::Inactive(id.to_string()));
        }
        Ok(product)
    }
}
