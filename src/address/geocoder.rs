//! Geocoder results
//!
//! Reads the subset of a maps geocoder result the address form uses.

use serde::{Deserialize, Serialize};

/// A point on the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lng: f64,
}

/// One `address_components` entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AddressComponent {
    /// Full name, e.g. `"Avenida Amazonas"`.
    pub long_name: String,

    /// Component types, e.g. `["route"]`.
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    fn is(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

/// A geocoder or place-autocomplete result.
#[derive(Debug, Deserialize)]
pub struct GeocoderResult {
    #[serde(default)]
    formatted_address: String,

    #[serde(default)]
    address_components: Vec<AddressComponent>,

    geometry: Option<Geometry>,
}

/// Address parts recognised in a geocoder result. Missing parts are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectedAddress {
    /// `administrative_area_level_1`
    pub province: String,

    /// `administrative_area_level_2`
    pub district: String,

    /// `route`
    pub street: String,

    /// `sublocality`, else `neighborhood`, else `locality`
    pub zone: String,

    /// `street_number`
    pub number: String,
}

impl DetectedAddress {
    /// Picks the known component types out of `components`.
    pub fn from_components(components: &[AddressComponent]) -> Self {
        let find = |kind: &str| {
            components
                .iter()
                .find(|component| component.is(kind))
                .map(|component| component.long_name.clone())
        };

        Self {
            province: find("administrative_area_level_1").unwrap_or_default(),
            district: find("administrative_area_level_2").unwrap_or_default(),
            street: find("route").unwrap_or_default(),
            zone: find("sublocality")
                .or_else(|| find("neighborhood"))
                .or_else(|| find("locality"))
                .unwrap_or_default(),
            number: find("street_number").unwrap_or_default(),
        }
    }
}

/// What a successful lookup hands to the address form.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressLookup {
    /// Free-text address shown to the customer.
    pub formatted_address: String,

    /// Recognised parts.
    pub detected: DetectedAddress,

    /// Pin location, if the result had one.
    pub coordinates: Option<Coordinates>,
}

impl From<GeocoderResult> for AddressLookup {
    fn from(result: GeocoderResult) -> Self {
        Self {
            detected: DetectedAddress::from_components(&result.address_components),
            formatted_address: result.formatted_address,
            coordinates: result.geometry.map(|geometry| geometry.location),
        }
    }
}
