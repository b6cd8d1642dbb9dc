//! Catalog
//!
//! Loads the static menu from YAML. The restaurant's menu ships embedded in
//! the binary; a file can replace it per deployment.

use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use tracing::debug;

use crate::{
    menu::{CatalogError, MenuItem, PriceVariant, VariantChoice},
    pricing::parse_price,
};

const LUIGIS_CATALOG: &str = include_str!("../../catalog/luigis.yml");

/// Wrapper for the catalog YAML document.
#[derive(Debug, Deserialize)]
struct CatalogFixture {
    categories: Vec<CategoryFixture>,
}

#[derive(Debug, Deserialize)]
struct CategoryFixture {
    name: String,
    items: Vec<ItemFixture>,
}

#[derive(Debug, Deserialize)]
struct ItemFixture {
    name: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    image: Option<String>,

    #[serde(default)]
    choice: VariantChoice,

    variants: Vec<VariantFixture>,
}

#[derive(Debug, Deserialize)]
struct VariantFixture {
    #[serde(default)]
    label: String,

    /// Price string, e.g. `"4.50 USD"`.
    price: String,

    #[serde(default)]
    add_on: bool,
}

/// A named group of menu items.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuCategory {
    name: String,
    items: Vec<MenuItem>,
}

impl MenuCategory {
    /// Category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Items in menu order.
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }
}

/// The full menu, read-only after loading.
#[derive(Clone, Debug)]
pub struct Catalog {
    categories: Vec<MenuCategory>,
    index: FxHashMap<String, (usize, usize)>,
    currency: &'static Currency,
}

impl Catalog {
    /// The restaurant's embedded menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded YAML fails validation.
    pub fn luigis() -> Result<Self, CatalogError> {
        Self::from_yaml(LUIGIS_CATALOG)
    }

    /// Loads a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading catalog");

        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// Parses and validates a catalog YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, a price cannot be parsed,
    /// an item fails validation, names repeat, or currencies differ.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

        let categories = fixture
            .categories
            .into_iter()
            .map(MenuCategory::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(categories)
    }

    fn new(categories: Vec<MenuCategory>) -> Result<Self, CatalogError> {
        let mut index = FxHashMap::default();
        let mut currency: Option<&'static Currency> = None;

        for (c, category) in categories.iter().enumerate() {
            for (i, item) in category.items.iter().enumerate() {
                if index.insert(item.name.clone(), (c, i)).is_some() {
                    return Err(CatalogError::DuplicateItem(item.name.clone()));
                }

                let item_currency = item
                    .default_variant()
                    .map(|variant| variant.price().currency())
                    .ok_or_else(|| CatalogError::NoVariants(item.name.clone()))?;

                match currency {
                    None => currency = Some(item_currency),
                    Some(expected) if expected != item_currency => {
                        return Err(CatalogError::CurrencyMismatch {
                            item: item.name.clone(),
                            expected: expected.iso_alpha_code,
                            found: item_currency.iso_alpha_code,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        let currency = currency.ok_or(CatalogError::Empty)?;

        debug!(
            categories = categories.len(),
            items = index.len(),
            currency = currency.iso_alpha_code,
            "catalog loaded"
        );

        Ok(Self {
            categories,
            index,
            currency,
        })
    }

    /// Categories in menu order.
    pub fn categories(&self) -> &[MenuCategory] {
        &self.categories
    }

    /// All items across categories, in menu order.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.categories
            .iter()
            .flat_map(|category| category.items.iter())
    }

    /// Finds an item by its unique name.
    pub fn find(&self, name: &str) -> Option<&MenuItem> {
        let (c, i) = self.index.get(name)?;

        self.categories.get(*c)?.items.get(*i)
    }

    /// Currency every item is priced in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}

impl TryFrom<CategoryFixture> for MenuCategory {
    type Error = CatalogError;

    fn try_from(fixture: CategoryFixture) -> Result<Self, Self::Error> {
        let items = fixture
            .items
            .into_iter()
            .map(|item| item_from_fixture(&fixture.name, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MenuCategory {
            name: fixture.name,
            items,
        })
    }
}

fn item_from_fixture(category: &str, fixture: ItemFixture) -> Result<MenuItem, CatalogError> {
    let variants = fixture
        .variants
        .into_iter()
        .map(|variant| {
            let (minor_units, currency) =
                parse_price(&variant.price).map_err(|source| CatalogError::Price {
                    item: fixture.name.clone(),
                    source,
                })?;

            let price = Money::from_minor(minor_units, currency);

            Ok(if variant.add_on {
                PriceVariant::add_on(variant.label, price)
            } else {
                PriceVariant::new(variant.label, price)
            })
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let item = MenuItem::new(
        fixture.name,
        fixture.description,
        category,
        variants,
        fixture.choice,
    )?;

    Ok(match fixture.image {
        Some(image) => item.with_image(image),
        None => item,
    })
}
