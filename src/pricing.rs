//! Prices

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{Findable, Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Money in a statically known ISO currency.
pub type Price = Money<'static, Currency>;

/// Errors that can occur while calculating line or cart totals.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Unit price multiplied by quantity does not fit in minor units.
    #[error("line total overflows for quantity {0}")]
    Overflow(u32),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Errors that can occur while parsing a price string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsePriceError {
    /// The string was not of the form `AMOUNT CURRENCY` or the amount was invalid.
    #[error("invalid price format: {0}")]
    InvalidPrice(String),

    /// Currency code is not an ISO currency.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// Parse a price string (e.g. `"4.50 USD"`) into minor units and currency.
///
/// # Errors
///
/// Returns an error if the string is not in the format `AMOUNT CURRENCY`,
/// if the amount is not a decimal with at most the currency's precision,
/// or if the currency code is not recognised.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), ParsePriceError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ParsePriceError::InvalidPrice(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let currency =
        Currency::find(code).ok_or_else(|| ParsePriceError::UnknownCurrency(code.to_string()))?;

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| ParsePriceError::InvalidPrice(s.to_string()))?;

    if amount.is_sign_negative() || amount.scale() > currency.exponent {
        return Err(ParsePriceError::InvalidPrice(s.to_string()));
    }

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .and_then(|value| value.to_i64())
        .ok_or_else(|| ParsePriceError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Unit price multiplied by quantity, computed in exact minor units.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the product does not fit in minor units.
pub fn line_total(unit: &Price, quantity: u32) -> Result<Price, PricingError> {
    let minor = unit
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(PricingError::Overflow(quantity))?;

    Ok(Money::from_minor(minor, unit.currency()))
}

/// Calculates the total of `(unit price, quantity)` pairs.
///
/// An empty sequence totals zero in `currency`.
///
/// # Errors
///
/// - [`PricingError::Overflow`]: a line total overflowed.
/// - [`PricingError::Money`]: wrapped money arithmetic or currency mismatch error.
pub fn total_price<'l>(
    lines: impl IntoIterator<Item = (&'l Price, u32)>,
    currency: &'static Currency,
) -> Result<Price, PricingError> {
    lines
        .into_iter()
        .try_fold(Money::from_minor(0, currency), |acc, (unit, quantity)| {
            Ok(acc.add(line_total(unit, quantity)?)?)
        })
}

/// Decimal amount of a price, as sent over the wire.
pub fn to_decimal(price: &Price) -> Decimal {
    Decimal::new(price.to_minor_units(), price.currency().exponent)
}

/// Display string with the currency symbol and two decimal places, e.g. `$9.00`.
pub fn format_price(price: &Price) -> String {
    format!("{}{:.2}", price.currency().symbol, to_decimal(price))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_price_reads_amount_and_currency() -> TestResult {
        assert_eq!(parse_price("4.50 USD")?, (450, USD));
        assert_eq!(parse_price("18 USD")?, (1800, USD));
        assert_eq!(parse_price("2.5 GBP")?, (250, GBP));

        Ok(())
    }

    #[test]
    fn parse_price_rejects_invalid_format() {
        assert!(matches!(
            parse_price("4.50USD"),
            Err(ParsePriceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("4.50 USD extra"),
            Err(ParsePriceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("-1.00 USD"),
            Err(ParsePriceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("4.505 USD"),
            Err(ParsePriceError::InvalidPrice(_))
        ));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(ParsePriceError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn line_total_multiplies_in_minor_units() -> TestResult {
        let unit = Money::from_minor(575, USD);

        assert_eq!(line_total(&unit, 3)?, Money::from_minor(1725, USD));

        Ok(())
    }

    #[test]
    fn line_total_reports_overflow() {
        let unit = Money::from_minor(i64::MAX, USD);

        assert_eq!(line_total(&unit, 2), Err(PricingError::Overflow(2)));
    }

    #[test]
    fn total_price_of_nothing_is_zero() -> TestResult {
        assert_eq!(total_price([], USD)?, Money::from_minor(0, USD));

        Ok(())
    }

    #[test]
    fn repeated_additions_do_not_drift() -> TestResult {
        let unit = Money::from_minor(10, USD);
        let lines = vec![(&unit, 1); 1000];

        assert_eq!(total_price(lines, USD)?, Money::from_minor(1000, USD));

        Ok(())
    }

    #[test]
    fn format_price_uses_two_decimals() {
        assert_eq!(format_price(&Money::from_minor(900, USD)), "$9.00");
        assert_eq!(format_price(&Money::from_minor(1725, USD)), "$17.25");
    }
}
