use serde::{Deserialize, Serialize};
use crate::pricing::PaymentPlan;

/// What a customer can buy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// One-time website build, paid as deposit + balance.
    Offer,
    /// Recurring maintenance subscription, paid in full per billing cycle.
    Pack,
    /// Custom project priced by staff through a quote. Never listed in the catalog.
    Quote,
}

impl ProductType {
    pub fn payment_plan(&self) -> PaymentPlan {
        match self {
            ProductType::Offer | ProductType::Quote => PaymentPlan::Split,
            ProductType::Pack => PaymentPlan::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Offer => "offer",
            ProductType::Pack => "pack",
            ProductType::Quote => "quote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "offer" => Some(ProductType::Offer),
            "pack" => Some(ProductType::Pack),
            "quote" => Some(ProductType::Quote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

/// Catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub product_type: ProductType,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub billing_period: Option<BillingPeriod>,
    pub features: Vec<String>,
    pub is_active: bool,
}

/// Product as written in configuration; the type comes from the list it sits in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub billing_period: Option<BillingPeriod>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool { true }

impl ProductEntry {
    pub fn into_product(self, product_type: ProductType) -> Product {
        let billing_period = match product_type {
            ProductType::Pack => Some(self.billing_period.unwrap_or(BillingPeriod::Monthly)),
            _ => None,
        };
        Product {
            id: self.id,
            product_type,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            billing_period,
            features: self.features,
            is_active: self.is_active,
        }
    }
}
