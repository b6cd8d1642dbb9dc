//! Menu
//!
//! Immutable menu data: categories of items, each item carrying one or more
//! price variants. Items declare up front whether adding them to the cart
//! needs a variant choice, so the cart never has to inspect names or labels.

use serde::Deserialize;
use thiserror::Error;

use crate::pricing::{ParsePriceError, Price};

pub mod catalog;

pub use catalog::Catalog;

/// Errors raised while building menu items or loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// IO error reading a catalog file.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse catalog YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A variant price could not be parsed.
    #[error("item {item} has an invalid price: {source}")]
    Price {
        /// Item whose variant failed to parse.
        item: String,

        /// Underlying parse failure.
        #[source]
        source: ParsePriceError,
    },

    /// Item has no variants.
    #[error("item {0} has no price variants")]
    NoVariants(String),

    /// Two variants on the same item share a label.
    #[error("item {item} has duplicate variant label {label:?}")]
    DuplicateVariant {
        /// Item name.
        item: String,

        /// Repeated label.
        label: String,
    },

    /// Two items in the catalog share a name.
    #[error("duplicate item name: {0}")]
    DuplicateItem(String),

    /// Item's price currency differs from the rest of the catalog.
    #[error("item {item} is priced in {found}, but the catalog uses {expected}")]
    CurrencyMismatch {
        /// Item name.
        item: String,

        /// Catalog currency.
        expected: &'static str,

        /// Item currency.
        found: &'static str,
    },

    /// Declared variant choice does not fit the item's variants.
    #[error("item {item} cannot use {choice:?} selection: {reason}")]
    InvalidChoice {
        /// Item name.
        item: String,

        /// Declared choice.
        choice: VariantChoice,

        /// What is wrong with the variants.
        reason: &'static str,
    },

    /// Catalog contains no items.
    #[error("catalog has no items")]
    Empty,
}

/// How a customer picks between an item's variants before it reaches the cart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantChoice {
    /// Single variant, added directly.
    #[default]
    None,

    /// Binary with/without choice for an add-on (e.g. fries).
    AddOn,

    /// Pick exactly one of several variants (e.g. a drink flavor).
    Flavor,
}

/// One purchasable size, flavor or add-on option of a menu item.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceVariant {
    label: String,
    price: Price,
    add_on: bool,
}

impl PriceVariant {
    /// Creates a plain variant.
    pub fn new(label: impl Into<String>, price: Price) -> Self {
        Self {
            label: label.into(),
            price,
            add_on: false,
        }
    }

    /// Creates the variant that carries the add-on.
    pub fn add_on(label: impl Into<String>, price: Price) -> Self {
        Self {
            add_on: true,
            ..Self::new(label, price)
        }
    }

    /// Variant label; empty for single-variant items.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unit price.
    pub fn price(&self) -> &Price {
        &self.price
    }

    /// Whether this variant includes the add-on.
    pub fn is_add_on(&self) -> bool {
        self.add_on
    }
}

/// A menu item. Built once from catalog data, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuItem {
    name: String,
    description: String,
    category: String,
    image: String,
    variants: Vec<PriceVariant>,
    choice: VariantChoice,
}

/// Image shown for items that do not declare one.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

impl MenuItem {
    /// Creates a menu item, checking its variants against the declared choice.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NoVariants`]: `variants` is empty.
    /// - [`CatalogError::DuplicateVariant`]: two variants share a label.
    /// - [`CatalogError::CurrencyMismatch`]: variants are priced in different currencies.
    /// - [`CatalogError::InvalidChoice`]: `choice` does not fit the variants.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        variants: Vec<PriceVariant>,
        choice: VariantChoice,
    ) -> Result<Self, CatalogError> {
        let name = name.into();

        validate_variants(&name, &variants, choice)?;

        Ok(Self {
            name,
            description: description.into(),
            category: category.into(),
            image: PLACEHOLDER_IMAGE.to_string(),
            variants,
            choice,
        })
    }

    /// Replaces the item image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Item name, unique within a catalog.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Item description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Category the item is listed under.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Image URL or path.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Variants in menu order; never empty.
    pub fn variants(&self) -> &[PriceVariant] {
        &self.variants
    }

    /// Declared variant choice.
    pub fn choice(&self) -> VariantChoice {
        self.choice
    }

    /// Whether a variant must be chosen before the item can be added.
    pub fn requires_choice(&self) -> bool {
        self.choice != VariantChoice::None
    }

    /// First variant, used when no choice is needed.
    pub fn default_variant(&self) -> Option<&PriceVariant> {
        self.variants.first()
    }

    /// Finds a variant by label.
    pub fn variant(&self, label: &str) -> Option<&PriceVariant> {
        self.variants.iter().find(|variant| variant.label == label)
    }

    /// The variant chosen by a with/without add-on decision.
    pub fn add_on_variant(&self, with_add_on: bool) -> Option<&PriceVariant> {
        self.variants
            .iter()
            .find(|variant| variant.add_on == with_add_on)
    }

    /// Lowest variant price, shown on menu cards.
    pub fn starting_price(&self) -> Option<&Price> {
        self.variants
            .iter()
            .map(PriceVariant::price)
            .min_by_key(|price| price.to_minor_units())
    }
}

fn validate_variants(
    item: &str,
    variants: &[PriceVariant],
    choice: VariantChoice,
) -> Result<(), CatalogError> {
    let Some(first) = variants.first() else {
        return Err(CatalogError::NoVariants(item.to_string()));
    };

    for (i, variant) in variants.iter().enumerate() {
        if variant.price.currency() != first.price.currency() {
            return Err(CatalogError::CurrencyMismatch {
                item: item.to_string(),
                expected: first.price.currency().iso_alpha_code,
                found: variant.price.currency().iso_alpha_code,
            });
        }

        if variants
            .iter()
            .take(i)
            .any(|earlier| earlier.label == variant.label)
        {
            return Err(CatalogError::DuplicateVariant {
                item: item.to_string(),
                label: variant.label.clone(),
            });
        }
    }

    let invalid = |reason| CatalogError::InvalidChoice {
        item: item.to_string(),
        choice,
        reason,
    };

    let add_ons = variants.iter().filter(|variant| variant.add_on).count();

    match choice {
        VariantChoice::None if variants.len() > 1 => {
            Err(invalid("several variants need a declared choice"))
        }
        VariantChoice::AddOn if variants.len() != 2 || add_ons != 1 => Err(invalid(
            "needs exactly one add-on variant and one plain variant",
        )),
        VariantChoice::Flavor if variants.len() < 2 => Err(invalid("needs at least two flavors")),
        VariantChoice::None | VariantChoice::Flavor if add_ons > 0 => {
            Err(invalid("only add-on items may flag an add-on variant"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso};
    use testresult::TestResult;

    use super::*;

    fn usd(minor: i64) -> Price {
        Money::from_minor(minor, iso::USD)
    }

    fn burger() -> Result<MenuItem, CatalogError> {
        MenuItem::new(
            "LUIGII DE CARNE",
            "Carne de res",
            "Hamburguesas",
            vec![
                PriceVariant::new("Sola", usd(450)),
                PriceVariant::add_on("Con papas", usd(575)),
            ],
            VariantChoice::AddOn,
        )
    }

    #[test]
    fn add_on_variant_picks_by_flag() -> TestResult {
        let item = burger()?;

        assert_eq!(
            item.add_on_variant(true).map(PriceVariant::label),
            Some("Con papas")
        );
        assert_eq!(
            item.add_on_variant(false).map(PriceVariant::label),
            Some("Sola")
        );
        assert!(item.requires_choice());

        Ok(())
    }

    #[test]
    fn starting_price_is_cheapest_variant() -> TestResult {
        assert_eq!(burger()?.starting_price(), Some(&usd(450)));

        Ok(())
    }

    #[test]
    fn new_uses_placeholder_image() -> TestResult {
        let item = burger()?;

        assert_eq!(item.image(), PLACEHOLDER_IMAGE);
        assert_eq!(item.with_image("/a.png").image(), "/a.png");

        Ok(())
    }

    #[test]
    fn empty_variants_are_rejected() {
        let result = MenuItem::new("X", "", "Varios", vec![], VariantChoice::None);

        assert!(matches!(result, Err(CatalogError::NoVariants(name)) if name == "X"));
    }

    #[test]
    fn several_variants_without_choice_are_rejected() {
        let result = MenuItem::new(
            "BATIDOS",
            "",
            "Bebidas",
            vec![
                PriceVariant::new("Fresa", usd(275)),
                PriceVariant::new("Piña", usd(275)),
            ],
            VariantChoice::None,
        );

        assert!(matches!(result, Err(CatalogError::InvalidChoice { .. })));
    }

    #[test]
    fn add_on_without_flagged_variant_is_rejected() {
        let result = MenuItem::new(
            "X",
            "",
            "Hamburguesas",
            vec![
                PriceVariant::new("Sola", usd(450)),
                PriceVariant::new("Con papas", usd(575)),
            ],
            VariantChoice::AddOn,
        );

        assert!(matches!(result, Err(CatalogError::InvalidChoice { .. })));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let result = MenuItem::new(
            "X",
            "",
            "Bebidas",
            vec![
                PriceVariant::new("Fresa", usd(275)),
                PriceVariant::new("Fresa", usd(300)),
            ],
            VariantChoice::Flavor,
        );

        assert!(matches!(
            result,
            Err(CatalogError::DuplicateVariant { label, .. }) if label == "Fresa"
        ));
    }

    #[test]
    fn mixed_currencies_are_rejected() {
        let result = MenuItem::new(
            "X",
            "",
            "Bebidas",
            vec![
                PriceVariant::new("Fresa", usd(275)),
                PriceVariant::new("Piña", Money::from_minor(275, iso::EUR)),
            ],
            VariantChoice::Flavor,
        );

        assert!(matches!(result, Err(CatalogError::CurrencyMismatch { .. })));
    }
}
