use comanda_core::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An extra the customer may add to a product, possibly for a surcharge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub extra_price: Money,
}

/// Core product structure as published by the menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Money,
    /// Always part of the dish, listed for the kitchen ticket
    pub required_ingredients: Vec<String>,
    pub optional_ingredients: Vec<Ingredient>,
    pub is_active: bool,
}

impl Product {
    pub fn new(name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            unit_price,
            required_ingredients: Vec::new(),
            optional_ingredients: Vec::new(),
            is_active: true,
        }
    }

    pub fn with_required(mut self, ingredients: &[&str]) -> Self {
        self.required_ingredients = ingredients.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_optional(mut self, name: &str, extra_price: Money) -> Self {
        self.optional_ingredients.push(Ingredient {
            name: name.to_string(),
            extra_price,
        });
        self
    }
}

/// One personalised product in the customer's cart.
///
/// Prices are copied from the catalog when the line is built so later menu
/// edits cannot reach an order already placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub selected_optional_ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub required_ingredients: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl CartLine {
    /// Build a line from a catalog product and the names of the chosen extras
    pub fn from_product(
        product: &Product,
        quantity: u32,
        selected: &[&str],
        note: Option<String>,
    ) -> Result<Self, ProductError> {
        if !product.is_active {
            return Err(ProductError::Inactive(product.name.clone()));
        }
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity(product.name.clone()));
        }

        let selected_optional_ingredients = selected
            .iter()
            .map(|name| {
                product
                    .optional_ingredients
                    .iter()
                    .find(|i| i.name == *name)
                    .cloned()
                    .ok_or_else(|| ProductError::UnknownIngredient {
                        product: product.name.clone(),
                        ingredient: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
            selected_optional_ingredients,
            required_ingredients: product.required_ingredients.clone(),
            note: note.filter(|n| !n.trim().is_empty()),
        })
    }

    /// Unit price plus extras, times quantity
    pub fn subtotal(&self) -> Result<Money, ProductError> {
        let overflow = || ProductError::AmountOverflow(self.product_name.clone());

        let unit = self
            .selected_optional_ingredients
            .iter()
            .try_fold(self.unit_price, |acc, i| acc.checked_add(i.extra_price))
            .ok_or_else(overflow)?;
        unit.checked_mul(Money::from(self.quantity)).ok_or_else(overflow)
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.quantity == 0 {
            return Err(ProductError::InvalidQuantity(self.product_name.clone()));
        }
        if self.unit_price < 0 || self.selected_optional_ingredients.iter().any(|i| i.extra_price < 0) {
            return Err(ProductError::InvalidPrice(self.product_name.clone()));
        }
        self.subtotal()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, line: CartLine) {
        self.lines.push(line);
    }

    pub fn with_line(mut self, line: CartLine) -> Self {
        self.add(line);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Result<Money, ProductError> {
        self.lines.iter().try_fold(0, |acc: Money, line| {
            acc.checked_add(line.subtotal()?)
                .ok_or_else(|| ProductError::AmountOverflow("cart total".to_string()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error("Product not available: {0}")]
    Inactive(String),

    #[error("Quantity must be at least 1 for {0}")]
    InvalidQuantity(String),

    #[error("Negative price on {0}")]
    InvalidPrice(String),

    #[error("{product} has no optional ingredient named {ingredient}")]
    UnknownIngredient { product: String, ingredient: String },

    #[error("Amount too large on {0}")]
    AmountOverflow(String),
}
