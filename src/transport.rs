//! JSON-over-HTTP transport for the session, order, webhook and promo endpoints.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when talking to a remote endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-2xx status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,

        /// Response body, possibly empty.
        body: String,
    },

    /// Connection, TLS or protocol failure.
    #[error("http error: {0}")]
    Network(#[source] reqwest::Error),

    /// A 2xx response whose body is not JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether the endpoint answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Sends JSON requests and returns the decoded JSON response.
#[automock]
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` a JSON document.
    async fn get_json(&self, url: &Url) -> Result<Value, TransportError>;

    /// `POST` a JSON body and decode the JSON response.
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, TransportError>;
}

/// [`Transport`] backed by `reqwest` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self { http, timeout })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, TransportError> {
        let response = request.send().await.map_err(|error| self.classify(error))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| self.classify(error))?;

        debug!(status = status.as_u16(), bytes = bytes.len(), "response received");

        decode_body(&bytes)
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Network(error)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &Url) -> Result<Value, TransportError> {
        debug!(%url, "GET");

        self.send(self.http.get(url.clone())).await
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, TransportError> {
        debug!(%url, "POST");

        self.send(self.http.post(url.clone()).json(body)).await
    }
}

/// Decodes a 2xx body.
///
/// Blank bodies decode as `null` and count as success, so a webhook that
/// answers `200` or `204` with nothing still confirms the order. Anything
/// else must be JSON.
fn decode_body(bytes: &[u8]) -> Result<Value, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_slice(bytes)?)
}

/// Appends path `segments` to `base`, keeping any path prefix on `base`.
///
/// Segments are percent-encoded, so tokens can be passed as-is.
///
/// # Errors
///
/// Returns a message if `base` cannot carry a path (e.g. `mailto:`).
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, String> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|()| format!("{base} cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}
