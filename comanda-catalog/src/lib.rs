pub mod product;
pub mod pricing;

pub use product::{Cart, CartLine, Ingredient, Product, ProductError};
pub use pricing::{compute_delivery_fee, ensure_coverage, quote, DeliveryQuote, PricingConfig, PricingError};
