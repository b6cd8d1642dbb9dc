//! Terminal tables for the menu and the cart review.

use std::io;

use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::Cart,
    menu::Catalog,
    pricing::{PricingError, format_price},
};

/// Errors that can occur while writing a table.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The cart total could not be computed.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Writing to the output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Writes the catalog, one row per variant, grouped by category.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_menu(mut out: impl io::Write, catalog: &Catalog) -> Result<(), DisplayError> {
    let mut builder = Builder::default();

    builder.push_record(["Category", "Item", "Variant", "Price"]);

    for category in catalog.categories() {
        for item in category.items() {
            for (index, variant) in item.variants().iter().enumerate() {
                let (category, name) = if index == 0 {
                    (category.name(), item.name())
                } else {
                    ("", "")
                };

                builder.push_record([
                    category.to_string(),
                    name.to_string(),
                    variant.label().to_string(),
                    format_price(variant.price()),
                ]);
            }
        }
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..4), Alignment::right());

    writeln!(out, "{table}")?;

    Ok(())
}

/// Writes the cart lines followed by the total.
///
/// # Errors
///
/// Returns an error if a total overflows or the output cannot be written.
pub fn write_cart(mut out: impl io::Write, cart: &Cart) -> Result<(), DisplayError> {
    let mut builder = Builder::default();

    builder.push_record(["Item", "Variant", "Qty", "Unit", "Total"]);

    for line in cart.lines() {
        builder.push_record([
            line.name().to_string(),
            line.variant().label().to_string(),
            line.quantity().to_string(),
            format_price(line.unit_price()),
            format_price(&line.total()?),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "{table}")?;
    writeln!(out, " Total: {}", format_price(&cart.total_price()?))?;

    Ok(())
}
