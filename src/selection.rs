//! Variant selection
//!
//! Short-lived modal state for items that need a fries or flavor decision
//! before they can be added: `Closed -> AwaitingChoice(item) -> Closed`.

use std::mem;

use crate::menu::{MenuItem, PriceVariant, VariantChoice};

/// The customer's answer to a selection prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Choice {
    /// With (`true`) or without (`false`) the add-on.
    AddOn(bool),

    /// A flavor variant label.
    Flavor(String),
}

/// Variant selection modal.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VariantSelection {
    /// No prompt is showing.
    #[default]
    Closed,

    /// Waiting for the customer to choose a variant of `item`.
    AwaitingChoice(MenuItem),
}

impl VariantSelection {
    /// Opens the prompt for `item` if it needs a choice.
    ///
    /// Returns `false` and stays as-is when the item can be added directly.
    pub fn open(&mut self, item: &MenuItem) -> bool {
        if !item.requires_choice() {
            return false;
        }

        *self = Self::AwaitingChoice(item.clone());

        true
    }

    /// Resolves the prompt, returning the item and the chosen variant.
    ///
    /// Always closes the prompt. A choice that does not fit the item (wrong
    /// kind, unknown flavor) yields `None`.
    pub fn resolve(&mut self, choice: &Choice) -> Option<(MenuItem, PriceVariant)> {
        let Self::AwaitingChoice(item) = mem::take(self) else {
            return None;
        };

        let variant = match (item.choice(), choice) {
            (VariantChoice::AddOn, Choice::AddOn(with_add_on)) => {
                item.add_on_variant(*with_add_on)
            }
            (VariantChoice::Flavor, Choice::Flavor(label)) => item.variant(label),
            _ => None,
        }
        .cloned()?;

        Some((item, variant))
    }

    /// Closes the prompt without choosing, returning the item it was for.
    pub fn cancel(&mut self) -> Option<MenuItem> {
        match mem::take(self) {
            Self::AwaitingChoice(item) => Some(item),
            Self::Closed => None,
        }
    }

    /// Whether a prompt is showing.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::AwaitingChoice(_))
    }

    /// The item awaiting a choice.
    pub fn pending(&self) -> Option<&MenuItem> {
        match self {
            Self::AwaitingChoice(item) => Some(item),
            Self::Closed => None,
        }
    }

    /// Options the prompt offers, in menu order.
    pub fn options(&self) -> &[PriceVariant] {
        match self {
            Self::AwaitingChoice(item) => item.variants(),
            Self::Closed => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::menu::Catalog;

    use super::*;

    #[test]
    fn single_variant_items_do_not_open() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut selection = VariantSelection::default();

        assert!(!selection.open(catalog.find("TACOS").ok_or("missing item")?));
        assert!(!selection.is_open());

        Ok(())
    }

    #[test]
    fn fries_choice_resolves_to_add_on_variant() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut selection = VariantSelection::default();

        assert!(selection.open(catalog.find("LUIGII DE CARNE").ok_or("missing item")?));
        assert_eq!(selection.options().len(), 2);

        let (item, variant) = selection
            .resolve(&Choice::AddOn(true))
            .ok_or("expected a variant")?;

        assert_eq!(item.name(), "LUIGII DE CARNE");
        assert_eq!(variant.label(), "Con papas");
        assert!(!selection.is_open());

        Ok(())
    }

    #[test]
    fn flavor_choice_resolves_by_label() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut selection = VariantSelection::default();

        selection.open(catalog.find("BATIDOS").ok_or("missing item")?);

        let (_, variant) = selection
            .resolve(&Choice::Flavor("Piña".to_string()))
            .ok_or("expected a variant")?;

        assert_eq!(variant.label(), "Piña");

        Ok(())
    }

    #[test]
    fn mismatched_choice_closes_without_variant() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut selection = VariantSelection::default();

        selection.open(catalog.find("BATIDOS").ok_or("missing item")?);

        assert_eq!(selection.resolve(&Choice::AddOn(true)), None);
        assert!(!selection.is_open());

        selection.open(catalog.find("BATIDOS").ok_or("missing item")?);

        assert_eq!(selection.resolve(&Choice::Flavor("Mango".to_string())), None);
        assert!(!selection.is_open());

        Ok(())
    }

    #[test]
    fn cancel_returns_pending_item() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut selection = VariantSelection::default();

        selection.open(catalog.find("LICUADOS").ok_or("missing item")?);

        assert_eq!(
            selection.cancel().map(|item| item.name().to_string()),
            Some("LICUADOS".to_string())
        );
        assert_eq!(selection.cancel(), None);
        assert!(selection.options().is_empty());

        Ok(())
    }

    #[test]
    fn resolving_closed_prompt_yields_nothing() {
        let mut selection = VariantSelection::Closed;

        assert_eq!(selection.resolve(&Choice::AddOn(false)), None);
    }
}
