//! Address capture
//!
//! The address form collects a free-text address, the structured parts the
//! customer can correct, and an optional map pin, then sends them back to
//! the ordering workflow once.

use std::fmt;

use jiff::Timestamp;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    checkout::SOURCE_TAG,
    notifications::{Toast, ToastKind, messages},
    session::PageParams,
    transport::{Transport, TransportError, endpoint},
};

pub mod geocoder;

pub use geocoder::{AddressComponent, AddressLookup, Coordinates, DetectedAddress, GeocoderResult};

/// Errors that can occur while submitting an address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// No address has been selected or typed.
    #[error("no address selected")]
    MissingAddress,

    /// A submission is already outstanding.
    #[error("an address submission is already in progress")]
    InProgress,

    /// No resume URL, webhook or session token to send the address to.
    #[error("no address endpoint is configured")]
    NoEndpoint,

    /// An endpoint could not be built.
    #[error("invalid address endpoint: {0}")]
    InvalidEndpoint(String),

    /// The payload could not be serialised.
    #[error("cannot encode address payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The endpoint rejected the address or could not be reached.
    #[error("address submission failed: {0}")]
    Transport(#[from] TransportError),

    /// No submission was outstanding when a result arrived.
    #[error("no address submission is in progress")]
    NotSubmitting,
}

/// Structured address fields, with the wire names the workflow expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetails {
    /// References, landmarks, apartment.
    #[serde(rename = "additionalInfo")]
    pub additional_info: String,

    /// Province.
    #[serde(rename = "provincia")]
    pub province: String,

    /// District.
    #[serde(rename = "distrito")]
    pub district: String,

    /// Street.
    #[serde(rename = "calle")]
    pub street: String,

    /// Neighbourhood or zone.
    #[serde(rename = "zona")]
    pub zone: String,

    /// House number.
    #[serde(rename = "numero")]
    pub number: String,

    /// Postal code.
    #[serde(rename = "codigoPostal")]
    pub postal_code: String,
}

impl AddressDetails {
    /// Overwrites fields with the non-empty detected parts.
    fn merge(&mut self, detected: &DetectedAddress) {
        for (field, value) in [
            (&mut self.province, &detected.province),
            (&mut self.district, &detected.district),
            (&mut self.street, &detected.street),
            (&mut self.zone, &detected.zone),
            (&mut self.number, &detected.number),
        ] {
            if !value.is_empty() {
                field.clone_from(value);
            }
        }
    }
}

/// Deployment endpoints an address may be sent to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressEndpoints {
    /// Backend API base URL.
    pub api_url: Option<Url>,

    /// Address confirmation webhook.
    pub webhook_url: Option<Url>,
}

impl AddressEndpoints {
    /// Resume URL, then webhook, then `{api}/api/sessions/{token}/address`.
    ///
    /// # Errors
    ///
    /// - [`AddressError::NoEndpoint`]: none of the three is available.
    /// - [`AddressError::InvalidEndpoint`]: the session URL cannot be built.
    pub fn resolve(&self, page: &PageParams) -> Result<Url, AddressError> {
        if let Some(url) = page.resume_url.as_ref().or(self.webhook_url.as_ref()) {
            return Ok(url.clone());
        }

        match (&self.api_url, &page.token) {
            (Some(api), Some(token)) => endpoint(api, &["api", "sessions", token, "address"])
                .map_err(AddressError::InvalidEndpoint),
            _ => Err(AddressError::NoEndpoint),
        }
    }
}

/// `addressDetails` on the wire: the form fields plus pin and send time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmittedDetails {
    /// Form fields.
    #[serde(flatten)]
    pub details: AddressDetails,

    /// Map pin; `null` when the customer never placed one.
    pub coordinates: Option<Coordinates>,

    /// When the address was sent.
    pub timestamp: Timestamp,
}

/// Body posted to the address endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    /// Order identifier from the page.
    #[serde(rename = "order_id")]
    pub order_id: Option<String>,

    /// Free-text address.
    pub full_address: String,

    /// Structured parts.
    pub address_details: SubmittedDetails,

    /// Always [`SOURCE_TAG`].
    pub source: &'static str,
}

/// A prepared address submission.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressRequest {
    /// Destination.
    pub url: Url,

    /// Body.
    pub payload: AddressPayload,
}

/// Address form state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddressForm {
    full_address: String,
    details: AddressDetails,
    coordinates: Option<Coordinates>,
    submitting: bool,
    notice: Option<Toast>,
}

impl AddressForm {
    /// An empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an address picked on the map or from autocomplete.
    ///
    /// Detected parts only replace fields when they are non-empty, so a
    /// partial result does not wipe what the customer already has. The pin
    /// is kept when the selection carries none.
    pub fn select_address(
        &mut self,
        address: impl Into<String>,
        detected: &DetectedAddress,
        coordinates: Option<Coordinates>,
    ) {
        self.full_address = address.into();
        self.details.merge(detected);

        if coordinates.is_some() {
            self.coordinates = coordinates;
        }
    }

    /// Applies a geocoder lookup. A failed lookup leaves the form as it was.
    ///
    /// Returns whether the form changed.
    pub fn apply_lookup<E: fmt::Display>(&mut self, lookup: Result<AddressLookup, E>) -> bool {
        match lookup {
            Ok(lookup) => {
                self.select_address(lookup.formatted_address, &lookup.detected, lookup.coordinates);

                true
            }
            Err(error) => {
                warn!(%error, "address lookup failed; keeping current address");

                false
            }
        }
    }

    /// Free-text address.
    pub fn full_address(&self) -> &str {
        &self.full_address
    }

    /// Structured fields.
    pub fn details(&self) -> &AddressDetails {
        &self.details
    }

    /// Structured fields, for edits typed by the customer.
    pub fn details_mut(&mut self) -> &mut AddressDetails {
        &mut self.details
    }

    /// Map pin.
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    /// Whether a submission is outstanding.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Outcome message of the last submission.
    pub fn notice(&self) -> Option<&Toast> {
        self.notice.as_ref()
    }

    /// Validates the form, picks the endpoint and marks it submitting.
    ///
    /// # Errors
    ///
    /// - [`AddressError::InProgress`]: a submission is outstanding.
    /// - [`AddressError::MissingAddress`]: no address yet.
    /// - [`AddressError::NoEndpoint`] / [`AddressError::InvalidEndpoint`]:
    ///   nowhere to send it.
    pub fn begin_submit(
        &mut self,
        page: &PageParams,
        endpoints: &AddressEndpoints,
    ) -> Result<AddressRequest, AddressError> {
        if self.submitting {
            return Err(AddressError::InProgress);
        }

        if self.full_address.trim().is_empty() {
            return Err(AddressError::MissingAddress);
        }

        let url = endpoints.resolve(page)?;

        let payload = AddressPayload {
            order_id: page.order_id.clone(),
            full_address: self.full_address.clone(),
            address_details: SubmittedDetails {
                details: self.details.clone(),
                coordinates: self.coordinates,
                timestamp: Timestamp::now(),
            },
            source: SOURCE_TAG,
        };

        self.submitting = true;

        info!(%url, "submitting address");

        Ok(AddressRequest { url, payload })
    }

    /// Settles a submission; the form is kept either way.
    ///
    /// # Errors
    ///
    /// - [`AddressError::NotSubmitting`]: nothing was outstanding.
    /// - [`AddressError::Transport`]: the submission failed.
    pub fn finish_submit<T>(&mut self, outcome: Result<T, TransportError>) -> Result<(), AddressError> {
        if !self.submitting {
            return Err(AddressError::NotSubmitting);
        }

        self.submitting = false;

        let now = Timestamp::now();

        match outcome {
            Ok(_) => {
                self.notice = Some(Toast::sticky(ToastKind::Success, messages::ADDRESS_SENT, now));

                Ok(())
            }
            Err(error) => {
                warn!(%error, "address submission failed");

                self.notice = Some(Toast::sticky(ToastKind::Error, messages::ADDRESS_FAILED, now));

                Err(error.into())
            }
        }
    }

    /// Sends the address with `transport`.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::begin_submit`] or [`Self::finish_submit`].
    pub async fn submit(
        &mut self,
        transport: &dyn Transport,
        page: &PageParams,
        endpoints: &AddressEndpoints,
    ) -> Result<(), AddressError> {
        let request = self.begin_submit(page, endpoints)?;

        let body = match serde_json::to_value(&request.payload) {
            Ok(body) => body,
            Err(error) => {
                self.submitting = false;

                return Err(AddressError::Encode(error));
            }
        };

        let outcome = transport.post_json(&request.url, &body).await;

        self.finish_submit(outcome)
    }
}
