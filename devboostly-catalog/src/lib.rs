pub mod product;
pub mod pricing;
pub mod catalog;

pub use product::{BillingPeriod, Product, ProductEntry, ProductType};
pub use pricing::{PaymentPlan, PaymentSplit, PricingError, DEFAULT_DEPOSIT_PERCENT, MAX_AMOUNT_CENTS, MIN_CHARGE_CENTS};
pub use catalog::{Catalog, CatalogConfig, CatalogError};
