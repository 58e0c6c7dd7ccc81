// src/notes/mod.rs

pub mod catalog;
pub mod rules;

use serde::Deserialize;
use serde::Serialize;

pub use catalog::{map_to_form_value, normalize};
pub use rules::apply_business_rules;

/// A single line of a delivery note (remito).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub product: String,
    /// Not validated here: zero or negative values pass through untouched.
    pub quantity: i64,
    /// Exact option string for the stock-movement form's product dropdown.
    #[serde(default)]
    pub form_value: Option<String>,
    /// Set only on lines synthesized by the business rules.
    #[serde(default)]
    pub is_auto_added: bool,
}

impl Item {
    /// A line as it was read off the note, before mapping.
    pub fn extracted(product: impl Into<String>, quantity: i64) -> Self {
        Self {
            product: product.into(),
            quantity,
            form_value: None,
            is_auto_added: false,
        }
    }

    /// A line the rules engine adds; its form value comes from the catalog.
    pub fn inferred(product: impl Into<String>, quantity: i64) -> Self {
        let product = product.into();
        let form_value = map_to_form_value(&product);
        Self {
            product,
            quantity,
            form_value: Some(form_value),
            is_auto_added: true,
        }
    }

    /// Lowercased, trimmed product name used for every substring check.
    pub fn normalized(&self) -> String {
        normalize(&self.product)
    }

    /// True when the form value is missing or just the raw product string,
    /// i.e. the catalog had no entry for it and a human has to pick the option.
    pub fn needs_review(&self) -> bool {
        match &self.form_value {
            Some(value) => *value == self.product && catalog::lookup(&self.product).is_none(),
            None => true,
        }
    }
}

/// Everything read from one delivery note image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedNote {
    pub items: Vec<Item>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub remito_number: Option<String>,
    #[serde(default)]
    pub fecha: Option<String>,
}

impl ParsedNote {
    pub fn auto_added_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_auto_added).count()
    }

    /// Items the form-filling side cannot select without a human decision.
    pub fn unmapped_items(&self) -> Vec<&Item> {
        self.items.iter().filter(|i| i.needs_review()).collect()
    }
}
