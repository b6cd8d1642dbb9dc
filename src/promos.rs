//! Weekday promotions
//!
//! Each promotion runs on one weekday. Today's weekday comes from the
//! server (`/api/promo-day`), not the customer's clock.

use jiff::{Timestamp, civil::Weekday};
use reqwest::Url;
use rusty_money::{Money, iso};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{
    menu::{CatalogError, MenuItem, PriceVariant, VariantChoice},
    pricing::Price,
    transport::{Transport, TransportError, endpoint},
};

/// Menu category promotions are added under.
pub const PROMO_CATEGORY: &str = "Promociones";

/// Errors that can occur while working with promotions.
#[derive(Debug, Error)]
pub enum PromoError {
    /// The promo-day endpoint failed.
    #[error("cannot fetch promo day: {0}")]
    Fetch(#[from] TransportError),

    /// The promo-day answer was malformed.
    #[error("invalid promo day response: {0}")]
    Decode(#[source] serde_json::Error),

    /// `day` was outside `0..=6`.
    #[error("invalid weekday index {0}")]
    InvalidDay(u8),

    /// The promo-day endpoint could not be built.
    #[error("invalid promo endpoint: {0}")]
    InvalidEndpoint(String),

    /// The promotion does not run today; carries the customer message.
    #[error("{0}")]
    Unavailable(String),

    /// The promotion could not be turned into a menu item.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A weekday promotion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Promo {
    weekday: Weekday,
    name: &'static str,
    description: &'static str,
    price_minor: i64,
    day_label: &'static str,
    image: &'static str,
}

const PROMOS: [Promo; 3] = [
    Promo {
        weekday: Weekday::Monday,
        name: "MEGA COMBO",
        description: "Hamburguesa de pollo con bacon + Papas",
        price_minor: 599,
        day_label: "TODOS LOS LUNES",
        image: "https://pub-b31207be229f4824971f6e8674928e73.r2.dev/promo-monday.png",
    },
    Promo {
        weekday: Weekday::Tuesday,
        name: "MONCHI-PAPAS",
        description: "Papas cargadas con queso, bacon y salsa especial",
        price_minor: 599,
        day_label: "TODOS LOS MARTES",
        image: "https://pub-b31207be229f4824971f6e8674928e73.r2.dev/promo-wednesdays.png",
    },
    Promo {
        weekday: Weekday::Wednesday,
        name: "DOBLE CARNE",
        description: "Hamburguesa doble carne",
        price_minor: 499,
        day_label: "TODOS LOS MIÉRCOLES",
        image: "https://pub-b31207be229f4824971f6e8674928e73.r2.dev/wednesday.PNG",
    },
];

impl Promo {
    /// All promotions, Monday first.
    pub fn all() -> &'static [Promo] {
        &PROMOS
    }

    /// The promotion running on `weekday`, if any.
    pub fn for_weekday(weekday: Weekday) -> Option<&'static Promo> {
        PROMOS.iter().find(|promo| promo.weekday == weekday)
    }

    /// Day the promotion runs.
    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Banner label, e.g. `TODOS LOS LUNES`.
    pub fn day_label(&self) -> &'static str {
        self.day_label
    }

    /// Banner image.
    pub fn image(&self) -> &'static str {
        self.image
    }

    /// Promotional price.
    pub fn price(&self) -> Price {
        Money::from_minor(self.price_minor, iso::USD)
    }

    /// Whether the promotion runs on `weekday`.
    pub fn is_available_on(&self, weekday: Weekday) -> bool {
        self.weekday == weekday
    }

    /// Message shown when the promotion is picked on another day.
    pub fn unavailable_message(&self) -> String {
        format!(
            "Esta promoción estará disponible {}, te esperamos pronto",
            self.day_label.to_lowercase()
        )
    }

    /// The promotion as a single-variant menu item.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogError` if the item fails menu validation.
    pub fn to_menu_item(&self) -> Result<MenuItem, CatalogError> {
        Ok(MenuItem::new(
            self.name,
            self.description,
            PROMO_CATEGORY,
            vec![PriceVariant::new("", self.price())],
            VariantChoice::None,
        )?
        .with_image(self.image))
    }

    /// Picks the promotion. `today` is `None` when the server day is unknown,
    /// in which case no promotion is available.
    ///
    /// # Errors
    ///
    /// - [`PromoError::Unavailable`]: not today; carries the customer message.
    /// - [`PromoError::Catalog`]: see [`Self::to_menu_item`].
    pub fn select(&self, today: Option<Weekday>) -> Result<MenuItem, PromoError> {
        if !today.is_some_and(|day| self.is_available_on(day)) {
            return Err(PromoError::Unavailable(self.unavailable_message()));
        }

        Ok(self.to_menu_item()?)
    }
}

/// `/api/promo-day` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PromoDay {
    /// Server time.
    pub iso: Timestamp,

    /// Weekday index, `0` = Sunday.
    pub day: u8,

    /// Human-readable date.
    pub date: String,
}

impl PromoDay {
    /// Weekday of the server date.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::InvalidDay`] if `day` is not in `0..=6`.
    pub fn weekday(&self) -> Result<Weekday, PromoError> {
        i8::try_from(self.day)
            .ok()
            .and_then(|offset| Weekday::from_sunday_zero_offset(offset).ok())
            .ok_or(PromoError::InvalidDay(self.day))
    }
}

/// Reads the server's current day.
#[derive(Debug, Clone)]
pub struct PromoClient<T> {
    transport: T,
    base_url: Url,
}

impl<T: Transport> PromoClient<T> {
    /// Client for the site at `base_url`.
    pub fn new(transport: T, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// `GET {base}/api/promo-day`.
    ///
    /// # Errors
    ///
    /// Returns a `PromoError` if the request fails or the answer is malformed.
    pub async fn current_day(&self) -> Result<PromoDay, PromoError> {
        let url = endpoint(&self.base_url, &["api", "promo-day"])
            .map_err(PromoError::InvalidEndpoint)?;

        let body = self.transport.get_json(&url).await?;

        serde_json::from_value(body).map_err(PromoError::Decode)
    }

    /// Today's weekday, or `None` if the server could not tell us.
    pub async fn today(&self) -> Option<Weekday> {
        match self.current_day().await.and_then(|day| day.weekday()) {
            Ok(weekday) => Some(weekday),
            Err(error) => {
                warn!(%error, "promo day unknown; promotions shown as unavailable");

                None
            }
        }
    }
}
